//! Face abstraction, link-layer fragmentation and control-plane client for
//! µDCN. The real transport (a shared-memory ring shared with an NDN
//! forwarder) lives outside this crate; [`transport::Transport`] is the seam
//! a real binding would implement.

pub mod config;
pub mod control;
pub mod face;
pub mod fragmentation;
pub mod transport;

pub use config::FaceOptions;
pub use control::ControlClient;
pub use face::{Face, FaceEvent};
pub use transport::{in_process_pair, InProcessTransport, Transport};
