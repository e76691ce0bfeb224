//! ipho-relay - photobooth event relay.
//!
//! Relays "a photo was taken" and "here is the photo" events from a local
//! command FIFO to one remote display client, while independently tracking
//! whether that client is still reachable.
//!
//! # Architecture
//!
//! Three actors share two objects:
//!
//! - **Command source** - reads FIFO lines and publishes them to the [`Mailbox`]
//! - **Liveness monitor** - probes the heartbeat channel and owns the [`LivenessFlag`]
//! - **Session loop** - waits for ALIVE, accepts a data client and runs the forwarder
//!
//! # Modules
//!
//! - [`protocol`] - Wire codec (frames and the base-255 length prefix)
//! - [`mailbox`] - Single-slot, last-write-wins command mailbox
//! - [`liveness`] - Shared client liveness flag
//! - [`relay`] - Process wiring
//! - [`receiver`] - Companion display client
//! - [`config`] - Configuration loading

// Library modules
pub mod command_source;
pub mod forwarder;
pub mod liveness;
pub mod mailbox;
pub mod monitor;
pub mod payload;
pub mod protocol;
pub mod receiver;
pub mod relay;
pub mod session;
pub mod transport;

pub mod config;
pub mod constants;

// Re-export commonly used types
pub use config::Config;
pub use forwarder::{Forwarder, SessionEnd};
pub use liveness::{ClientStatus, LivenessFlag};
pub use mailbox::{Command, Mailbox, Take};
pub use monitor::LivenessMonitor;
pub use protocol::{Frame, FrameDecoder};
pub use receiver::Receiver;
pub use relay::Relay;
pub use session::SessionLoop;
