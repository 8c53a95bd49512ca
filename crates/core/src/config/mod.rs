// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration modules

mod settings;
mod task;

pub use settings::{ConfigError, TaskSettings, ThrottleSettings};
pub use task::{dedup_categories, MatrixOptions, TaskLimits, ThrottleConfig, ThrottleMode};
