//! apikit core: transport-agnostic error surface and metric label policy.
//!
//! This crate defines the error types and the label/bucket contract shared by
//! the server crate and any host application that registers its own services.
//! It intentionally carries no transport or runtime dependencies so it can be
//! reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `ApiKitError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod labels;

/// Shared result type.
pub use error::{ApiKitError, Result};
