//! Workspace umbrella crate.
//!
//! Re-exports the `core-service` façade and exposes the workspace feature
//! flags. Host applications can depend on `dropbox-client-workspace` and
//! toggle `desktop-shims` without wiring each crate individually.

pub use core_service::*;
