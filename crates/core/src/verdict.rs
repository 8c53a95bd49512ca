// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Admission verdicts
//!
//! A denial is not an error: the caller re-queues the task and asks again
//! on a later tick.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Why a task was not admitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockReason {
    BuildPending,
    IdenticalRunInProgress,
    MaxTotal {
        count: u32,
        limit: u32,
    },
    MaxPerNode {
        count: u32,
        limit: u32,
    },
    IntervalNotElapsed {
        #[serde(with = "humantime_serde")]
        remaining: Duration,
    },
    CategoryMaxTotal {
        category: String,
        count: u32,
        limit: u32,
    },
    CategoryMaxPerNode {
        category: String,
        count: u32,
        limit: u32,
    },
    CategoryIntervalNotElapsed {
        category: String,
        #[serde(with = "humantime_serde")]
        remaining: Duration,
    },
}

impl BlockReason {
    /// The category that denied, for category-mode reasons
    pub fn category(&self) -> Option<&str> {
        match self {
            BlockReason::CategoryMaxTotal { category, .. }
            | BlockReason::CategoryMaxPerNode { category, .. }
            | BlockReason::CategoryIntervalNotElapsed { category, .. } => Some(category),
            _ => None,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::BuildPending => write!(f, "build pending"),
            BlockReason::IdenticalRunInProgress => write!(f, "identical run in progress"),
            BlockReason::MaxTotal { count, limit } => {
                write!(f, "max total capacity reached ({count}/{limit})")
            }
            BlockReason::MaxPerNode { count, limit } => {
                write!(f, "max per-node capacity reached ({count}/{limit})")
            }
            BlockReason::IntervalNotElapsed { .. } => write!(f, "interval not yet elapsed"),
            BlockReason::CategoryMaxTotal {
                category,
                count,
                limit,
            } => write!(
                f,
                "max total capacity reached for category {category} ({count}/{limit})"
            ),
            BlockReason::CategoryMaxPerNode {
                category,
                count,
                limit,
            } => write!(
                f,
                "max per-node capacity reached for category {category} ({count}/{limit})"
            ),
            BlockReason::CategoryIntervalNotElapsed { category, .. } => {
                write!(f, "interval not yet elapsed for category {category}")
            }
        }
    }
}

/// Outcome of one admission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Blocked(BlockReason),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub fn reason(&self) -> Option<&BlockReason> {
        match self {
            Verdict::Allow => None,
            Verdict::Blocked(reason) => Some(reason),
        }
    }
}

impl From<BlockReason> for Verdict {
    fn from(reason: BlockReason) -> Self {
        Verdict::Blocked(reason)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "allow"),
            Verdict::Blocked(reason) => write!(f, "blocked: {reason}"),
        }
    }
}

#[cfg(test)]
#[path = "verdict_tests.rs"]
mod tests;
