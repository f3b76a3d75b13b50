//! Platform client for the external App provider.
//!
//! Covers the two outbound calls the authorization callback needs: the
//! OAuth code exchange and the listing of App installations reachable by
//! the exchanged principal. Also builds the platform-defined redirect
//! targets (success, error, install-request).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod urls;

pub use client::{
    HttpPlatformClient, Installation, InstallationAccount, PlatformClient, PlatformConfig,
    UserToken,
};
pub use error::{PlatformError, Result};
pub use urls::AppUrls;
