//! The producer dispatcher (spec §4.3): Interest classification, the
//! file-handle cache with idle eviction, the worker pool, and Data signing.

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod sign;
pub mod worker;

pub use cache::FileHandleCache;
pub use config::ProducerOptions;
pub use sign::SigningMode;
pub use worker::ProducerDispatcher;
