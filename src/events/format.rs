// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Dedup keys, the session seen-set, and row formatting

use clap::ValueEnum;
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};

use super::model::{Event, Severity};

/// Messages longer than this are wrapped or truncated
pub const MESSAGE_WRAP_THRESHOLD: usize = 120;

/// Column width used when wrapping long messages
pub const MESSAGE_WRAP_WIDTH: usize = 100;

/// Display width for the namespace column
pub const NAMESPACE_WIDTH: usize = 20;

/// Display width for the name column
pub const NAME_WIDTH: usize = 40;

/// Default upper bound on remembered dedup keys
pub const DEFAULT_MAX_SEEN: usize = 50_000;

/// Timestamp format shown to the user
const HUMAN_TIME_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// Timestamp format used inside dedup keys (second precision)
const KEY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How a dedup key is derived from an event
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DedupBy {
    /// Creation time (seconds) + display name
    #[default]
    TimeName,
    /// Event UID, falling back to time+name when the UID is absent
    Uid,
}

pub fn dedup_key(event: &Event, by: DedupBy) -> String {
    match (by, &event.uid) {
        (DedupBy::Uid, Some(uid)) => uid.clone(),
        _ => format!("{}{}", event.created_at.format(KEY_TIME_FORMAT), event.name),
    }
}

/// Keys already rendered in this session, oldest evicted first
#[derive(Debug)]
pub struct SeenSet {
    keys: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SeenSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            keys: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a key. Returns false if it was already present.
    pub fn insert(&mut self, key: String) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.keys.remove(&oldest);
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Keys currently remembered
    pub fn count(&self) -> usize {
        self.order.len()
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SEEN)
    }
}

/// What to do with messages longer than the threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageMode {
    /// Wrap on word boundaries at `MESSAGE_WRAP_WIDTH`
    #[default]
    MultiLine,
    /// Cut to the threshold with a trailing `...`
    SingleLine,
}

/// A display-ready row handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRow {
    pub created_at: String,
    pub context: String,
    pub namespace: String,
    pub name: String,
    pub involved_kind: String,
    pub severity: Severity,
    pub reason: String,
    /// Wrapped lines are joined with `\n`
    pub message: String,
    pub multi_line: bool,
}

/// Turns events into rows for one session
#[derive(Debug, Clone)]
pub struct RowFormatter {
    context_width: usize,
    mode: MessageMode,
}

impl RowFormatter {
    /// The context column is as wide as the selected context name
    pub fn new(selected_context: &str, mode: MessageMode) -> Self {
        Self {
            context_width: selected_context.chars().count(),
            mode,
        }
    }

    pub fn format(&self, event: &Event) -> RenderRow {
        let (message, multi_line) = if event.message.chars().count() > MESSAGE_WRAP_THRESHOLD {
            match self.mode {
                MessageMode::MultiLine => {
                    let lines = wrap_words(&event.message, MESSAGE_WRAP_WIDTH);
                    let multi = lines.len() > 1;
                    (lines.join("\n"), multi)
                }
                MessageMode::SingleLine => (
                    truncate_value(&event.message, MESSAGE_WRAP_THRESHOLD).into_owned(),
                    false,
                ),
            }
        } else {
            (event.message.clone(), false)
        };

        RenderRow {
            created_at: event.created_at.format(HUMAN_TIME_FORMAT).to_string(),
            context: pad(&event.context, self.context_width),
            namespace: pad(&event.namespace, NAMESPACE_WIDTH),
            name: pad(&event.name, NAME_WIDTH),
            involved_kind: event.involved_kind.clone(),
            severity: event.severity.clone(),
            reason: event.reason.clone(),
            message,
            multi_line,
        }
    }
}

fn pad(value: &str, width: usize) -> String {
    format!("{:<width$}", value, width = width)
}

/// Truncate a string to max_len chars, adding "..." if truncated
pub fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

/// Greedy word wrap on whitespace only (hyphenated words stay whole).
/// A single word longer than `width` is split hard.
pub fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Cow<'_, str> = Cow::Borrowed(word);
        let mut word_len = word.chars().count();

        while word_len > width {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let head: String = word.chars().take(width).collect();
            let tail: String = word.chars().skip(width).collect();
            lines.push(head);
            word = Cow::Owned(tail);
            word_len -= width;
        }
        if word_len == 0 {
            continue;
        }

        let needed = if current_len == 0 { word_len } else { current_len + 1 + word_len };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(&word);
        current_len += word_len;
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current);
    }
    lines
}
