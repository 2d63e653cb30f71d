// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Raw and normalized event records

use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::WatchError;

/// One watch notification as delivered by the cluster session.
///
/// All fields are optional because the API server does not guarantee any of
/// them; `Event::normalize` decides which ones are required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEvent {
    pub uid: Option<String>,
    /// Watch resume point; not part of the normalized event
    pub resource_version: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub involved_kind: Option<String>,
    pub event_type: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Event type as reported by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    Normal,
    Warning,
    /// Anything else (including an absent type). Still flows through.
    Other(String),
}

impl Severity {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Normal") => Severity::Normal,
            Some("Warning") => Severity::Warning,
            Some(other) => Severity::Other(other.to_string()),
            None => Severity::Other(String::new()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Warning",
            Severity::Other(s) => s,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized event. Never mutated after `normalize`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub context: String,
    pub namespace: String,
    pub involved_kind: String,
    /// Display name: the event object name up to the first `.`
    pub name: String,
    pub severity: Severity,
    pub reason: String,
    /// Message with `(`/`)` replaced by `[`/`]`
    pub message: String,
}

impl Event {
    pub fn normalize(raw: RawEvent, context: &str) -> Result<Self, WatchError> {
        let created_at = raw
            .created_at
            .ok_or(WatchError::MalformedEvent { field: "creation timestamp" })?;
        let involved_kind = raw
            .involved_kind
            .ok_or(WatchError::MalformedEvent { field: "involved object kind" })?;
        let message = raw
            .message
            .ok_or(WatchError::MalformedEvent { field: "message" })?;

        let name = raw.name.unwrap_or_default();

        Ok(Self {
            uid: raw.uid.filter(|u| !u.is_empty()),
            created_at,
            context: context.to_string(),
            namespace: raw.namespace.unwrap_or_default(),
            involved_kind,
            name: display_name(&name).to_string(),
            severity: Severity::parse(raw.event_type.as_deref()),
            reason: raw.reason.unwrap_or_default(),
            message: escape_parens(&message),
        })
    }
}

/// Event names look like `<object>.<hex suffix>`; keep the object part
pub fn display_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Parentheses are control characters for the renderer markup
fn escape_parens(message: &str) -> String {
    message.replace('(', "[").replace(')', "]")
}
