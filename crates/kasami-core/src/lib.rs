//! Kasami protocol core logic
//!
//! This crate contains the pure state machine logic of the Suzuki–Kasami
//! token-based mutual exclusion algorithm. It is completely decoupled from
//! I/O, enabling deterministic testing.
//!
//! # Architecture: "The Hollow Shell"
//!
//! Protocol logic is strictly separated from transport concerns:
//!
//! ```text
//!      ┌────────────────────────────┐
//!      │ kasami-core                │
//!      │ - Process state machine    │
//!      │ - Token bookkeeping        │
//!      │ - Message validation       │
//!      └────────────────────────────┘
//!         ↓                      ↓
//! ┌────────────────┐  ┌────────────────┐
//! │ kasami-harness │  │ kasami-node    │
//! │ (Turmoil)      │  │ (Tokio)        │
//! │ - Virtual time │  │ - Task/process │
//! │ - Seeded RNG   │  │ - System clock │
//! │ - Step control │  │ - Channel bus  │
//! └────────────────┘  └────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - No I/O in Core: the state machine returns [`process::ProcessAction`]s
//!   and the driver executes them
//! - The token is an owned value: it is never `Clone`, and handing it to
//!   another process is a move
//! - Deterministic: Given the same inputs, produce the same outputs
//!
//! # Modules
//!
//! - [`process`]: Per-process request/grant state machine
//! - [`token`]: Grant vector and pending queue
//! - [`vector`]: Per-process request vector
//! - [`message`]: Request/token messages and wire conversion
//! - [`bus`]: Message bus abstraction (`send` / `broadcast`)
//! - [`system`]: System construction
//! - [`observer`]: Driver hooks for critical-section events
//! - [`env`]: Environment abstraction (time, RNG)
//! - [`config`]: Process and system configuration
//! - [`error`]: Process error types

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod bus;
pub mod config;
pub mod env;
pub mod error;
pub mod message;
pub mod observer;
pub mod process;
pub mod system;
pub mod token;
pub mod types;
pub mod vector;

pub use bus::{BusError, MessageBus};
pub use config::{ProcessConfig, SystemConfig};
pub use error::ProcessError;
pub use message::{Envelope, Message, MessageError, RequestMessage};
pub use observer::{CriticalSectionObserver, NoopObserver};
pub use process::{Process, ProcessAction, ProcessState};
pub use system::create_system;
pub use token::Token;
pub use types::ProcessId;
pub use vector::RequestVector;
