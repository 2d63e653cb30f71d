// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod client;
mod context_matcher;

pub use client::KubeContexts;
pub use context_matcher::ContextMatcher;
