// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Styled text spans
//!
//! Text is built as a list of `(Tone, text)` spans and rendered to terminal
//! escapes in one place, so no user text is ever parsed as markup.

use console::Style;
use regex::Regex;
use std::borrow::Cow;

use crate::events::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Dim,
    Timestamp,
    Context,
    Name,
    Reason,
    Normal,
    Warning,
    Unclassified,
    /// Filter match inside a message
    Highlight,
}

impl Tone {
    pub fn for_severity(severity: &Severity) -> Self {
        match severity {
            Severity::Normal => Tone::Normal,
            Severity::Warning => Tone::Warning,
            Severity::Other(_) => Tone::Unclassified,
        }
    }

    fn style(self) -> Style {
        match self {
            Tone::Plain => Style::new(),
            Tone::Dim => Style::new().dim(),
            Tone::Timestamp => Style::new().cyan(),
            Tone::Context => Style::new().blue(),
            Tone::Name => Style::new().magenta(),
            Tone::Reason => Style::new().green(),
            Tone::Normal => Style::new().green(),
            Tone::Warning => Style::new().yellow().bold(),
            Tone::Unclassified => Style::new().red(),
            Tone::Highlight => Style::new().black().on_yellow(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span<'a> {
    pub tone: Tone,
    pub text: Cow<'a, str>,
}

impl<'a> Span<'a> {
    pub fn new(tone: Tone, text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

/// Split `text` into spans, marking every match of `pattern` as highlighted
pub fn highlight_matches<'a>(text: &'a str, pattern: Option<&Regex>, base: Tone) -> Vec<Span<'a>> {
    let Some(re) = pattern else {
        return vec![Span::new(base, text)];
    };

    let mut spans = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        if m.start() > last {
            spans.push(Span::new(base, &text[last..m.start()]));
        }
        spans.push(Span::new(Tone::Highlight, m.as_str()));
        last = m.end();
    }
    if last < text.len() || spans.is_empty() {
        spans.push(Span::new(base, &text[last..]));
    }
    spans
}

/// Render spans to a string (plain text when colors are disabled)
pub fn render(spans: &[Span<'_>]) -> String {
    spans
        .iter()
        .map(|span| match span.tone {
            Tone::Plain => span.text.to_string(),
            tone => tone.style().apply_to(span.text.as_ref()).to_string(),
        })
        .collect()
}
