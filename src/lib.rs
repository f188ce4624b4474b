//! yarn-usage-agent - version 0.1.0
//!
//! Resident agent for YARN worker hosts. Discovers JVM container processes,
//! samples their CPU consumption relative to host-wide usage, and pushes
//! usage records and container termination notifications to a central
//! collector.
//!
//! The binary in `main.rs` wires these modules together; everything is
//! exported here so integration tests can drive the agent against a
//! synthetic proc tree and a recording sink.

pub mod accounting;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod identity;
pub mod instance;
pub mod procfs;
pub mod registry;
pub mod sampler;
pub mod sink;
pub mod state;

pub use config::Config;
pub use error::AgentError;
pub use event::UsageEvent;
pub use state::{AgentState, SharedState};
