// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority classes shared by the queue and the scheduler.

use serde::{Deserialize, Deserializer, Serialize};

/// Dispatch class of a job. Any unrecognised input normalises to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Classes in round-robin order.
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Normal, Priority::Low];

    pub fn normalize(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }

    /// Position in [`Priority::ALL`].
    pub fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

crate::simple_display! {
    Priority {
        High => "high",
        Normal => "normal",
        Low => "low",
    }
}

impl From<&str> for Priority {
    fn from(s: &str) -> Self {
        Priority::normalize(s)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Priority::normalize(&raw))
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
