// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod logline;
pub mod markup;
mod table;

pub use logline::LogView;
pub use table::TableView;

use clap::ValueEnum;
use std::io;
use std::time::Duration;

use crate::events::RenderRow;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Refreshing table of the most recent events
    #[default]
    Table,
    /// Scrolling, colorized one-event-per-line log
    Log,
}

/// Connection state changes surfaced to the user
#[derive(Debug, Clone, PartialEq)]
pub enum StreamNotice {
    Connected {
        context: String,
    },
    Reconnecting {
        context: String,
        reason: String,
        /// Set when the reconnect is rate limited
        delay: Option<Duration>,
    },
}

impl StreamNotice {
    pub fn message(&self) -> String {
        match self {
            StreamNotice::Connected { context } => format!("watching events on {}", context),
            StreamNotice::Reconnecting {
                context,
                reason,
                delay: None,
            } => format!("stream to {} closed ({}), reconnecting", context, reason),
            StreamNotice::Reconnecting {
                context,
                reason,
                delay: Some(delay),
            } => format!(
                "stream to {} closed ({}), reconnecting in {:.1}s",
                context,
                reason,
                delay.as_secs_f64()
            ),
        }
    }
}

/// Consumer side of the pipeline.
///
/// Called inline by the watch loop: the next event is not requested until
/// `emit` returns.
pub trait RowSink {
    fn emit(&mut self, row: RenderRow) -> io::Result<()>;

    fn notice(&mut self, notice: &StreamNotice) -> io::Result<()>;
}
