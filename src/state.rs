//! Shared agent state passed to the discovery loop and sampler tasks.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::discovery::ProcessFilter;
use crate::procfs::ProcFs;
use crate::registry::Registry;

pub struct AgentState {
    pub procfs: ProcFs,
    pub registry: Registry,
    /// Pids whose working directory failed identity extraction. Discovery
    /// leaves them alone while their process persists instead of
    /// re-registering them every tick; the set is pruned once the process
    /// leaves the table so a reused pid gets evaluated fresh.
    pub skipped: Registry,
    pub filter: ProcessFilter,
    pub discovery_interval: Duration,
    pub sample_interval: Duration,
}

impl AgentState {
    pub fn new(procfs: ProcFs, config: &Config) -> Self {
        Self {
            procfs,
            registry: Registry::new(),
            skipped: Registry::new(),
            filter: ProcessFilter::from_config(config),
            discovery_interval: config.discovery_interval(),
            sample_interval: config.sample_interval(),
        }
    }
}

/// Type alias for shared application state
pub type SharedState = Arc<AgentState>;
