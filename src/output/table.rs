// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use comfy_table::{Attribute, Cell, Color, Table, presets::ASCII_BORDERS_ONLY_CONDENSED};
use console::{Term, style};
use std::collections::VecDeque;
use std::io;

use super::{RowSink, StreamNotice};
use crate::events::{RenderRow, Severity};

const HEADERS: &[(&str, Option<Color>)] = &[
    ("created on", Some(Color::Cyan)),
    ("context", Some(Color::Blue)),
    ("namespace", Some(Color::Blue)),
    ("name", Some(Color::Magenta)),
    ("kind", None),
    ("type", Some(Color::Green)),
    ("reason", Some(Color::Green)),
    ("message", None),
];

/// Lines reserved for header, borders and the status line
const CHROME_LINES: usize = 6;

/// Fewest rows kept even on tiny terminals
const MIN_VISIBLE_ROWS: usize = 5;

/// Refreshing table of the most recent rows.
///
/// Only the rows that fit on screen are kept; older ones scroll away.
pub struct TableView {
    term: Term,
    rows: VecDeque<RenderRow>,
    capacity: usize,
    status: Option<String>,
}

impl TableView {
    pub fn new(term: Term) -> Self {
        let (height, _) = term.size();
        let capacity = (height as usize)
            .saturating_sub(CHROME_LINES)
            .max(MIN_VISIBLE_ROWS);
        Self::with_capacity(term, capacity)
    }

    pub fn with_capacity(term: Term, capacity: usize) -> Self {
        Self {
            term,
            rows: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            status: None,
        }
    }

    fn push(&mut self, row: RenderRow) {
        self.rows.push_back(row);
        while self.visible_lines() > self.capacity && self.rows.len() > 1 {
            self.rows.pop_front();
        }
    }

    /// A wrapped message occupies several screen lines
    fn visible_lines(&self) -> usize {
        self.rows
            .iter()
            .map(|r| {
                if r.multi_line {
                    r.message.lines().count().max(1)
                } else {
                    1
                }
            })
            .sum()
    }

    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);
        table.set_header(HEADERS.iter().map(|(title, color)| {
            let cell = Cell::new(title).add_attribute(Attribute::Bold);
            match color {
                Some(c) => cell.fg(*c),
                None => cell,
            }
        }));

        for (idx, row) in self.rows.iter().enumerate() {
            let severity_color = match row.severity {
                Severity::Normal => Color::Green,
                Severity::Warning => Color::Yellow,
                Severity::Other(_) => Color::Red,
            };
            let cells = [
                (row.created_at.as_str(), Some(Color::Cyan)),
                (row.context.as_str(), Some(Color::Blue)),
                (row.namespace.as_str(), Some(Color::Blue)),
                (row.name.as_str(), Some(Color::Magenta)),
                (row.involved_kind.as_str(), None),
                (row.severity.as_str(), Some(severity_color)),
                (row.reason.as_str(), Some(Color::Green)),
                (row.message.as_str(), None),
            ]
            .into_iter()
            .map(|(text, color)| {
                let mut cell = Cell::new(text);
                if let Some(c) = color {
                    cell = cell.fg(c);
                }
                // alternate rows are dimmed
                if idx % 2 == 1 {
                    cell = cell.add_attribute(Attribute::Dim);
                }
                cell
            });
            table.add_row(cells);
        }

        let mut output = table.to_string();
        if let Some(status) = &self.status {
            output.push('\n');
            output.push_str(&style(status).dim().to_string());
        }
        output
    }

    fn redraw(&self) -> io::Result<()> {
        self.term.clear_screen()?;
        self.term.write_line(&self.render())
    }
}

impl RowSink for TableView {
    fn emit(&mut self, row: RenderRow) -> io::Result<()> {
        self.push(row);
        self.redraw()
    }

    fn notice(&mut self, notice: &StreamNotice) -> io::Result<()> {
        self.status = Some(notice.message());
        self.redraw()
    }
}
