//! Test infrastructure for the integration gateway.
//!
//! Provides in-memory implementations of the storage, platform, and queue
//! boundaries plus fixture builders, so handler and worker tests run
//! deterministically without a database or network.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod fixtures;
pub mod platform;
pub mod queue;
pub mod store;
pub mod time;

pub use fixtures::{sign_payload, InstallationBuilder, SignedWebhook, WebhookRequestBuilder};
pub use platform::{StubFailure, StubPlatformClient};
pub use queue::MemoryTaskQueue;
pub use store::MemoryCredentialStore;
pub use time::TestClock;
