// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Interactive context picker

use anyhow::Result;
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Ask the user for a context by number or name.
///
/// Returns `None` when the prompt is interrupted (Ctrl+C / Ctrl+D).
pub fn pick_context(contexts: &[String], default: Option<&str>) -> Result<Option<String>> {
    let default = default.filter(|d| contexts.iter().any(|c| c == d));

    println!("{}", style("Contexts:").cyan().bold());
    for (idx, ctx) in contexts.iter().enumerate() {
        let marker = if Some(ctx.as_str()) == default { "*" } else { " " };
        println!(
            "{} {} {}",
            marker,
            style(format!("{:>3})", idx + 1)).dim(),
            style(ctx).blue()
        );
    }

    let prompt = match default {
        Some(d) => format!("context [{}]> ", d),
        None => "context> ".to_string(),
    };

    let mut rl = DefaultEditor::new()?;
    loop {
        match rl.readline(&prompt) {
            Ok(line) => match parse_choice(&line, contexts, default) {
                Ok(ctx) => return Ok(Some(ctx)),
                Err(msg) => println!("{} {}", style("Error:").red().bold(), style(msg).red()),
            },
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    }
}

/// Resolve one line of picker input: a 1-based index, a context name, or
/// empty for the default
fn parse_choice(input: &str, contexts: &[String], default: Option<&str>) -> Result<String, String> {
    let input = input.trim();
    if input.is_empty() {
        return default
            .map(str::to_string)
            .ok_or_else(|| "no default context, pick one".to_string());
    }

    if let Ok(n) = input.parse::<usize>() {
        return n
            .checked_sub(1)
            .and_then(|i| contexts.get(i))
            .cloned()
            .ok_or_else(|| format!("pick a number between 1 and {}", contexts.len()));
    }

    contexts
        .iter()
        .find(|c| c.as_str() == input)
        .cloned()
        .ok_or_else(|| format!("unknown context '{}'", input))
}
