//! Common types and utilities for the micro Data-Centric Networking (μDCN) implementation.
//!
//! This crate provides the wire formats, naming conventions, metadata codec
//! and metrics primitives shared by the face, pipeline and producer crates.

pub mod error;
pub mod metadata;
pub mod metrics;
pub mod name;
pub mod naming;
pub mod packet;
pub mod tlv;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
