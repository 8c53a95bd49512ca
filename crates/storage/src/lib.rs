// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! throttle-storage: WAL-based persistence for the pipeline gate

mod durable;
mod state;
mod wal;

pub use durable::{DurableError, DurableGate};
pub use state::{operations_for, MaterializedGate};
pub use wal::{Wal, WalError};
