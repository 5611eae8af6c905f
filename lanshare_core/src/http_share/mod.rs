//! HTTP file sharing module
//!
//! Provides the web interface phones and other LAN devices download from.

pub mod page;
pub mod server;

pub use server::{ShareState, content_disposition, create_router, serve};
