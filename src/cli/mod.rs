// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod args;
mod picker;

pub use args::{Args, Command};
pub use picker::pick_context;
