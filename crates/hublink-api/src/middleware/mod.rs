//! HTTP middleware: session authentication.

pub mod auth;
