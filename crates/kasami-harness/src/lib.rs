//! Deterministic simulation harness for Kasami protocol testing.
//!
//! This crate provides:
//!
//! - [`SimEnv`]: Turmoil virtual time and a seeded RNG
//! - [`SimBus`]: a [`MessageBus`](kasami_core::MessageBus) that carries
//!   `kasami-proto` frames over Turmoil TCP connections
//! - [`scenario`]: a step-wise [`World`](scenario::World) with per-pair FIFO
//!   channels, driven by a [`Scenario`](scenario::Scenario) that always ends
//!   in an oracle
//! - [`invariants`]: system-wide properties checked after every step

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_bus;
pub mod sim_env;

pub use sim_bus::SimBus;
pub use sim_env::SimEnv;
