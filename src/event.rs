//! Usage events produced by samplers and consumed by the dispatcher.

use serde::Serialize;

/// One CPU usage sample for a tracked container process.
///
/// `process_time` and `cpu_time` are cumulative seconds since process /
/// system start; `cpu_usage` is the percentage of host CPU the process used
/// over the most recent sampling window. Field names follow the collector's
/// wire format.
#[derive(Debug, Clone, Serialize)]
pub struct UsageEvent {
    pub pid: i32,
    #[serde(rename = "app")]
    pub application: String,
    pub container: String,
    /// Process start time, unix seconds.
    pub start: f64,
    /// Cumulative process CPU time in seconds.
    pub process_time: f64,
    /// Cumulative host CPU time in seconds.
    pub cpu_time: f64,
    /// Usage over the last sampling window, percent of host capacity.
    pub cpu_usage: f64,
    /// Emission timestamp, unix seconds.
    pub time: i64,
    /// Set on the single terminal event a sampler emits when its process
    /// exits. Conveyed to the collector through a separate endpoint, not the
    /// payload.
    #[serde(skip)]
    pub finished: bool,
}
