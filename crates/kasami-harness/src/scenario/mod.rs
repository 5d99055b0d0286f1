//! Scenario testing framework for deterministic protocol tests.
//!
//! A [`Scenario`] lists the steps to run against a [`World`]: who requests,
//! which frame is delivered next, who releases, how far time moves. Running
//! it checks the standard invariants after every step and then the oracle,
//! which is mandatory.

mod builder;
pub mod oracle;
mod world;

pub use builder::{RunnableScenario, Scenario, Step};
pub use oracle::OracleFn;
pub use world::{World, WorldEvent};
