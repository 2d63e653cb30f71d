// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Event ingestion and the filter/dedup/format pipeline
//!
//! Data flow: `EventSource` (raw notifications) → `Event::normalize` →
//! `EventWatcher` → `FilterSpec` → dedup + `RowFormatter` → `RowSink`.

pub mod filter;
pub mod format;
pub mod model;
pub mod pipeline;
pub mod watch;

pub use filter::{FilterSpec, severity_from_flags};
pub use format::{DedupBy, MessageMode, RenderRow, RowFormatter, SeenSet};
pub use model::{RawEvent, Severity};
pub use pipeline::Pipeline;
pub use watch::{EventSource, EventWatcher, RawEventStream};
