//! Top-level facade crate for apikit.
//!
//! Re-exports core types and the server library so users can depend on a single crate.

pub mod core {
    pub use apikit_core::*;
}

pub mod server {
    pub use apikit_server::*;
}
