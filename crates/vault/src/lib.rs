// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleet-vault: envelope-encrypted secrets and one-shot runtime sessions.

mod envelope;
pub mod runtime;
pub mod secret;

pub use envelope::{EnvelopeError, CIPHER};
pub use runtime::{
    Consumed, MaterializeRequest, RuntimeSecretError, RuntimeSecretId, RuntimeSecretStore, RuntimeSession,
    DEFAULT_RETAINED_SESSIONS, MAX_TTL_SECONDS, MIN_TTL_SECONDS,
};
pub use secret::{
    EncryptedSecretStore, EnvelopeInfo, ResolvedSecret, RotateRequest, SecretError, SecretMetadata, UpsertRequest,
};
