// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Context pattern matching and resolution
//!
//! Handles parsing and matching context specifications (exact names, globs, comma-separated lists)
//! against the short context names discovered from kubeconfig.

use crate::error::WatchError;

/// Resolves context specifications to concrete context names
///
/// Supports:
/// - Exact names: "prod"
/// - Glob patterns: "prod-*", "staging-?"
/// - Comma-separated lists: "prod, staging"
/// - Mixed: "prod-*, staging-01"
pub struct ContextMatcher<'a> {
    available_contexts: &'a [String],
}

impl<'a> ContextMatcher<'a> {
    pub fn new(available_contexts: &'a [String]) -> Self {
        Self { available_contexts }
    }

    /// Resolve a context specification to a list of matching context names,
    /// in kubeconfig order of first match
    ///
    /// Returns an error if:
    /// - An exact match is requested but the context doesn't exist
    /// - No contexts match the pattern
    pub fn resolve(&self, spec: &str) -> Result<Vec<String>, WatchError> {
        let mut matched_contexts = Vec::new();

        for part in spec.split(',') {
            let pattern = part.trim();
            if pattern.is_empty() {
                continue;
            }

            if pattern.contains('*') || pattern.contains('?') {
                for ctx in self.available_contexts {
                    if Self::glob_match(pattern, ctx) && !matched_contexts.contains(ctx) {
                        matched_contexts.push(ctx.clone());
                    }
                }
            } else {
                let pattern_str = pattern.to_string();
                if !self.available_contexts.contains(&pattern_str) {
                    return Err(WatchError::config(format!(
                        "context '{}' not found in kubeconfig",
                        pattern
                    )));
                }
                if !matched_contexts.contains(&pattern_str) {
                    matched_contexts.push(pattern_str);
                }
            }
        }

        if matched_contexts.is_empty() {
            return Err(WatchError::config(format!(
                "no contexts matched pattern '{}'",
                spec
            )));
        }

        Ok(matched_contexts)
    }

    /// Resolve a spec that must name exactly one context (watching is single-context)
    pub fn resolve_one(&self, spec: &str) -> Result<String, WatchError> {
        let mut matched = self.resolve(spec)?;
        if matched.len() > 1 {
            return Err(WatchError::config(format!(
                "'{}' matches {} contexts ({}); events are watched on one context at a time",
                spec,
                matched.len(),
                matched.join(", ")
            )));
        }
        Ok(matched.remove(0))
    }

    /// Simple glob pattern matching (supports * and ?)
    fn glob_match(pattern: &str, text: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let text: Vec<char> = text.chars().collect();

        let mut pi = 0; // pattern index
        let mut ti = 0; // text index
        let mut star_pi = None; // position of last '*' in pattern
        let mut star_ti = 0; // position in text when we saw last '*'

        while ti < text.len() {
            if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
                pi += 1;
                ti += 1;
            } else if pi < pattern.len() && pattern[pi] == '*' {
                star_pi = Some(pi);
                star_ti = ti;
                pi += 1;
            } else if let Some(sp) = star_pi {
                // backtrack: let the last '*' swallow one more character
                pi = sp + 1;
                star_ti += 1;
                ti = star_ti;
            } else {
                return false;
            }
        }

        while pi < pattern.len() && pattern[pi] == '*' {
            pi += 1;
        }

        pi == pattern.len()
    }
}
