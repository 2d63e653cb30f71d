// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Per-event filtering by text pattern and severity

use regex::Regex;

use super::model::{Event, Severity};
use crate::error::WatchError;

/// Immutable filter configuration for one watch session
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    text_pattern: Option<Regex>,
    severity_filter: Option<Severity>,
}

impl FilterSpec {
    /// Build a filter, compiling the pattern once up front.
    ///
    /// An invalid regex is a configuration error: it is reported before any
    /// connection is opened.
    pub fn new(pattern: Option<&str>, severity: Option<Severity>) -> Result<Self, WatchError> {
        let text_pattern = pattern
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| WatchError::config(format!("invalid filter pattern '{}': {}", p, e)))
            })
            .transpose()?;

        Ok(Self {
            text_pattern,
            severity_filter: severity,
        })
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.text_pattern.as_ref()
    }

    /// Whether the event should be rendered
    pub fn passes(&self, event: &Event) -> bool {
        if let Some(severity) = &self.severity_filter
            && &event.severity != severity
        {
            return false;
        }

        match &self.text_pattern {
            Some(re) => [
                event.name.as_str(),
                event.namespace.as_str(),
                event.message.as_str(),
                event.severity.as_str(),
            ]
            .iter()
            .any(|field| re.is_match(field)),
            None => true,
        }
    }

    /// Human-readable summary for logging
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(re) = &self.text_pattern {
            parts.push(format!("text~{}", re.as_str()));
        }
        if let Some(severity) = &self.severity_filter {
            parts.push(format!("type={}", severity));
        }
        if parts.is_empty() {
            "no filters (all events)".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Turn the `-w` / `-n` flags into a severity restriction.
///
/// The flags are mutually exclusive; passing both is rejected rather than
/// letting one silently win.
pub fn severity_from_flags(warnings: bool, normal: bool) -> Result<Option<Severity>, WatchError> {
    match (warnings, normal) {
        (true, true) => Err(WatchError::config(
            "-w (warnings only) and -n (normal only) cannot be combined",
        )),
        (true, false) => Ok(Some(Severity::Warning)),
        (false, true) => Ok(Some(Severity::Normal)),
        (false, false) => Ok(None),
    }
}
