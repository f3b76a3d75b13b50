//! Core domain models and storage for the Hublink integration gateway.
//!
//! Provides strongly-typed domain primitives for integrations, credentials,
//! and webhook tasks, plus the repository layer all other crates persist
//! through. Every other crate depends on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, GatewayError, Result};
pub use models::{
    AccountSummary, AuthenticationId, Integration, IntegrationAuthentication, IntegrationId,
    IntegrationService, IntegrationSettings, IntegrationType, NewAuthentication, NewIntegration,
    NewWebhookTask, Principal, TaskId, TaskStatus, UserId, WebhookTask, Workspace, WorkspaceId,
};
pub use storage::{CredentialStore, Storage};
pub use time::{Clock, RealClock};
