// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error taxonomy for the event pipeline
//!
//! Only `ConnectionSetup`, `Configuration` and `Render` ever leave the watch
//! loop. `MalformedEvent` is skipped; `Transport` and `Expired` reconnect.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// A single raw event lacked a required field
    #[error("malformed event: missing {field}")]
    MalformedEvent { field: &'static str },

    /// The watch stream broke, was reset, or reported an in-stream error
    #[error("watch stream error: {0}")]
    Transport(String),

    /// The resume point is older than the server keeps (410 Gone); the next
    /// connection starts over from the server's cache
    #[error("watch resource version expired: {0}")]
    Expired(String),

    /// Opening the watch connection failed (bad context, auth, unreachable API)
    #[error("failed to open event watch for context '{context}': {reason}")]
    ConnectionSetup { context: String, reason: String },

    /// Invalid flags, patterns or mapping files
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Writing to the terminal failed
    #[error("render error: {0}")]
    Render(#[from] std::io::Error),
}

impl WatchError {
    pub fn setup(context: &str, reason: impl std::fmt::Display) -> Self {
        WatchError::ConnectionSetup {
            context: context.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        WatchError::Configuration(msg.into())
    }
}
