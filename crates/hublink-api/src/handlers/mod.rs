//! HTTP request handlers for the gateway API.
//!
//! Handlers follow a consistent pattern: input validation at the boundary,
//! tracing for observability, and standardized terminal responses. The
//! callback always ends in a redirect; the webhook ingress always ends in
//! a definite status code. Neither leaks internal failure detail to the
//! caller.

pub mod callback;
pub mod health;
pub mod webhooks;

pub use callback::authorization_callback;
pub use health::{health_check, liveness_check, readiness_check};
pub use webhooks::receive_webhook;
