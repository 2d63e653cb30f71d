// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Filter → dedup → format, run inline for each delivered event

use super::filter::FilterSpec;
use super::format::{DedupBy, RenderRow, RowFormatter, SeenSet, dedup_key};
use super::model::Event;

/// Result of pushing one event through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Rendered(RenderRow),
    Filtered,
    Duplicate,
}

/// Per-session pipeline state. The seen-set lives here so it outlives any
/// single watch connection.
#[derive(Debug)]
pub struct Pipeline {
    filter: FilterSpec,
    formatter: RowFormatter,
    seen: SeenSet,
    dedup_by: DedupBy,
}

impl Pipeline {
    pub fn new(filter: FilterSpec, formatter: RowFormatter, seen: SeenSet, dedup_by: DedupBy) -> Self {
        Self {
            filter,
            formatter,
            seen,
            dedup_by,
        }
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn process(&mut self, event: &Event) -> Outcome {
        if !self.filter.passes(event) {
            return Outcome::Filtered;
        }
        if !self.seen.insert(dedup_key(event, self.dedup_by)) {
            return Outcome::Duplicate;
        }
        Outcome::Rendered(self.formatter.format(event))
    }

    pub fn seen_count(&self) -> usize {
        self.seen.count()
    }
}
