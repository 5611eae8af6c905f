//! Core of LanShare: serve local files to devices on the same network.
//!
//! The [`session::ShareSession`] owns a short-lived HTTP server built from
//! the [`catalog::Catalog`] of shared paths, gated by the
//! [`access::AccessPolicy`].

pub mod access;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod http_share;
pub mod paths;
pub mod session;
pub mod stats;

pub use catalog::{Catalog, CatalogItem, ItemKind, format_file_size};
pub use config::SessionConfig;
pub use error::ShareError;
pub use paths::{ShareKind, SharedPath, resolve_paths};
pub use session::{SessionState, ShareSession};
pub use stats::StatusReport;
