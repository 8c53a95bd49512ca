// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! throttle-core: admission control for a build fleet
//!
//! This crate provides:
//! - A category registry with atomic whole-set replacement
//! - Live node occupancy and explicit running counters
//! - The admission policy (`can_run` / `can_take`)
//! - A pipeline gate for nested, category-tagged scopes
//! - Host traits the engine reads from, with fakes behind `test-support`

pub mod category;
pub mod clock;
pub mod config;
pub mod counters;
pub mod gate;
pub mod host;
pub mod id;
pub mod index;
pub mod occupancy;
pub mod operation;
pub mod policy;
pub mod registry;
pub mod service;
pub mod task;
pub mod verdict;

pub use category::{normalize_limit, Category, NodeLabelOverride};
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, TaskLimits, ThrottleConfig, ThrottleMode, ThrottleSettings};
pub use counters::{RunningCounters, RunningEntry};
pub use gate::{
    CategoryUsage, FinishedScope, GateError, PipelineGate, RestoreReport, StorableGateState,
    StorableScope,
};
pub use host::{Executor, ExecutorSnapshot, Fleet, Node, NodeInventory, QueueState, RunningWork};
pub use host::TaskCatalog;
pub use id::{IdGen, OwnerId, RunId, ScopeId, SequentialIdGen, TaskId, UuidIdGen};
pub use index::TaskIndex;
pub use occupancy::{NodeOccupancy, TaskSet};
pub use operation::GateOperation;
pub use policy::ThrottlePolicy;
pub use registry::{CategoryRegistry, CategorySet};
pub use service::ThrottleService;
pub use task::{QueueItem, TaskKind};
pub use verdict::{BlockReason, Verdict};

#[cfg(any(test, feature = "test-support"))]
pub use host::{FakeFleet, FleetCall};
