// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use regex::Regex;
use std::io::{self, Write};

use super::markup::{self, Span, Tone};
use super::{RowSink, StreamNotice};
use crate::events::RenderRow;

/// Indent for continuation lines of wrapped messages
const CONTINUATION_INDENT: &str = "    ";

/// Scrolling one-line-per-event view
pub struct LogView<W: Write> {
    out: W,
    highlight: Option<Regex>,
}

impl<W: Write> LogView<W> {
    /// `highlight` marks filter matches inside messages
    pub fn new(out: W, highlight: Option<Regex>) -> Self {
        Self { out, highlight }
    }

    pub fn format_line(&self, row: &RenderRow) -> String {
        let severity = row.severity.to_string();
        let flattened;
        let (first, continuations): (&str, Vec<&str>) = if row.multi_line {
            let mut lines = row.message.lines();
            (lines.next().unwrap_or(""), lines.collect())
        } else {
            flattened = row.message.replace('\n', " ");
            (flattened.as_str(), Vec::new())
        };

        let mut spans = vec![
            Span::new(Tone::Timestamp, row.created_at.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::Context, row.context.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::Context, row.namespace.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::Name, row.name.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::Dim, row.involved_kind.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::for_severity(&row.severity), severity.as_str()),
            Span::new(Tone::Plain, " "),
            Span::new(Tone::Reason, row.reason.as_str()),
            Span::new(Tone::Plain, ": "),
        ];
        spans.extend(markup::highlight_matches(first, self.highlight.as_ref(), Tone::Plain));

        let mut line = markup::render(&spans);
        for continuation in continuations {
            line.push('\n');
            line.push_str(CONTINUATION_INDENT);
            line.push_str(&markup::render(&markup::highlight_matches(
                continuation,
                self.highlight.as_ref(),
                Tone::Plain,
            )));
        }
        line
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RowSink for LogView<W> {
    fn emit(&mut self, row: RenderRow) -> io::Result<()> {
        let line = self.format_line(&row);
        writeln!(self.out, "{}", line)?;
        self.out.flush()
    }

    fn notice(&mut self, notice: &StreamNotice) -> io::Result<()> {
        let text = format!("--- {} ---", notice.message());
        writeln!(self.out, "{}", markup::render(&[Span::new(Tone::Dim, text)]))?;
        self.out.flush()
    }
}
