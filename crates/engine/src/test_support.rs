// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fakes for queue and scheduler tests.

use crate::executor::{ApplyError, Executor};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    failures: HashMap<String, String>,
    panics: HashSet<String>,
}

/// Records applied paths in order. Optionally gated so a test decides when
/// each apply may finish.
#[derive(Clone, Default)]
pub struct FakeExecutor {
    state: Arc<Mutex<FakeState>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies block until [`FakeExecutor::release`] hands out a permit.
    pub fn gated() -> Self {
        Self { gate: Some(Arc::new(Semaphore::new(0))), ..Self::default() }
    }

    pub fn release(&self, applies: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(applies);
        }
    }

    pub fn fail_on(&self, config_path: &str, message: &str) {
        self.state.lock().failures.insert(config_path.to_string(), message.to_string());
    }

    pub fn panic_on(&self, config_path: &str) {
        self.state.lock().panics.insert(config_path.to_string());
    }

    /// Paths in the order applies started.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    #[allow(clippy::panic)]
    async fn apply_path(&self, config_path: &str) -> Result<(), ApplyError> {
        self.state.lock().calls.push(config_path.to_string());
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        let (panics, failure) = {
            let state = self.state.lock();
            (state.panics.contains(config_path), state.failures.get(config_path).cloned())
        };
        if panics {
            panic!("fake executor panic for {config_path}");
        }
        match failure {
            Some(message) => Err(ApplyError(message)),
            None => Ok(()),
        }
    }
}
