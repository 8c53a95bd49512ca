// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host collaborators: node inventory, executor occupancy, queue state and
//! the category reverse index

mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use traits::{
    Executor, ExecutorSnapshot, Fleet, Node, NodeInventory, QueueState, RunningWork, TaskCatalog,
};

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFleet, FleetCall};
