//! Tokio runtime driver for Kasami processes.
//!
//! Each process of a system runs as one Tokio task that owns its
//! [`Process`](kasami_core::Process) state machine, executes the actions it
//! returns and waits for the token by awaiting its inbox rather than
//! polling a flag.
//!
//! ```text
//!   ProcessHandle ──command──> ┌────────────┐ ──send/broadcast──> ChannelBus
//!        ^                     │ node task  │                         │
//!        └──oneshot/watch───── │ (Process)  │ <────────inbox──────────┘
//!                              └────────────┘
//! ```
//!
//! [`System::spawn`] builds the processes, the bus and the tasks; the caller
//! talks to processes through [`ProcessHandle`]s.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod config;
pub mod env;
pub mod error;
pub mod node;
pub mod system;

pub use bus::ChannelBus;
pub use config::NodeConfig;
pub use env::SystemEnv;
pub use error::NodeError;
pub use node::Node;
pub use system::{ProcessHandle, ProcessStatus, System};
