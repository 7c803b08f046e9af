//! Congestion-controlled Interest pipeline and consumer façade.
//!
//! A [`Pipeline`] owns one worker thread that drives a [`rust_udcn_face::Face`]:
//! admitting Interests up to a congestion window, routing Data/Nack responses
//! back to the consumer that requested them, and retrying on timeout. The
//! [`facade::ConsumerFacade`] is the file-oriented API built on top of it.

pub mod facade;
pub mod pipeline;
pub mod pit;
pub mod token;
pub mod window;

pub use facade::{ConsumerFacade, ConsumerOptions, FileHandle};
pub use pipeline::{Delivery, Pipeline};
pub use pit::{PendingInterest, PendingInterestTable, MAX_RETRIES};
pub use token::{next_nonce, next_pit_token};
pub use window::{AimdWindow, CongestionWindow, FixedWindow, WindowControl, MAX_RTT, MAX_WINDOW, MIN_WINDOW};
