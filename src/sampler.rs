//! Per-process sampling task.
//!
//! One task per tracked pid. The task owns its baselines exclusively: no
//! other task ever reads or writes them. The first snapshot only seeds the
//! baseline; every emitted usage percentage is computed from the delta
//! between two consecutive samples, so recent behavior always wins over
//! lifetime averages.

use chrono::Utc;
use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::{debug, info, warn};

use crate::accounting::{ticks_to_seconds, usage_percent};
use crate::event::UsageEvent;
use crate::identity::ContainerIdentity;
use crate::procfs::{HostCpuSnapshot, ProcessSnapshot};
use crate::state::SharedState;

/// Sampling state for one container process. Identity and start time are
/// fixed for the whole lifetime; the tick baselines advance on every sample.
#[derive(Debug)]
pub struct TrackedProcess {
    pub pid: i32,
    pub identity: ContainerIdentity,
    /// Process start time, unix seconds.
    pub start_time: f64,
    /// Most recent cumulative process CPU ticks.
    process_ticks: f64,
    /// Most recent cumulative host CPU ticks.
    host_ticks: f64,
    /// Usage computed over the most recent sampling window.
    last_usage: f64,
}

impl TrackedProcess {
    pub fn new(
        snapshot: &ProcessSnapshot,
        host: &HostCpuSnapshot,
        identity: ContainerIdentity,
    ) -> Self {
        Self {
            pid: snapshot.pid,
            identity,
            start_time: snapshot.start_time,
            process_ticks: snapshot.cpu_ticks,
            host_ticks: host.total(),
            last_usage: 0.0,
        }
    }

    /// Fold in a new sample: compute usage over the window since the previous
    /// sample, advance the baselines, and produce the ordinary event.
    pub fn advance(
        &mut self,
        snapshot: &ProcessSnapshot,
        host: &HostCpuSnapshot,
        now: i64,
    ) -> UsageEvent {
        let host_total = host.total();
        let process_delta = snapshot.cpu_ticks - self.process_ticks;
        let host_delta = host_total - self.host_ticks;
        let usage = usage_percent(process_delta, host_delta);

        self.process_ticks = snapshot.cpu_ticks;
        self.host_ticks = host_total;
        self.last_usage = usage;

        self.event(now, false)
    }

    /// The single terminal event, carrying the last successfully observed
    /// deltas. Emitted exactly once, after the process has disappeared.
    pub fn terminal_event(&self, now: i64) -> UsageEvent {
        self.event(now, true)
    }

    fn event(&self, now: i64, finished: bool) -> UsageEvent {
        UsageEvent {
            pid: self.pid,
            application: self.identity.application.clone(),
            container: self.identity.container.clone(),
            start: self.start_time,
            process_time: ticks_to_seconds(self.process_ticks),
            cpu_time: ticks_to_seconds(self.host_ticks),
            cpu_usage: self.last_usage,
            time: now,
            finished,
        }
    }
}

/// Sampler task body: Starting, then Sampling until the process exits, then
/// one terminal event.
///
/// Eventless exits (the process vanished before the first snapshot, or its
/// working directory is not an appcache path) unregister the pid directly,
/// since no terminal event will ever reach the dispatcher for it.
pub async fn run(
    state: SharedState,
    pid: i32,
    usage_tx: UnboundedSender<UsageEvent>,
    finish_tx: UnboundedSender<UsageEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    // Starting: take the initial baselines and extract the identity.
    let snapshot = match state.procfs.snapshot(pid) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            // Raced with an immediate exit between discovery and here.
            warn!(pid, "could not take initial snapshot, assuming exit: {}", e);
            state.registry.unregister(pid);
            return;
        }
    };

    let identity = match ContainerIdentity::from_cwd(&snapshot.cwd) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(pid, "skipping process: {}", e);
            // Remember the pid before releasing it so discovery cannot
            // re-register it between the two calls.
            state.skipped.register(pid);
            state.registry.unregister(pid);
            return;
        }
    };

    let host = match state.procfs.host_snapshot() {
        Ok(host) => host,
        Err(e) => {
            warn!(pid, "could not read host CPU ticks: {}", e);
            state.registry.unregister(pid);
            return;
        }
    };

    let mut tracked = TrackedProcess::new(&snapshot, &host, identity);
    debug!(
        pid,
        application = %tracked.identity.application,
        container = %tracked.identity.container,
        "sampler started"
    );

    // Sampling: one pass per interval until the process disappears.
    loop {
        tokio::select! {
            _ = tokio::time::sleep(state.sample_interval) => {}
            _ = shutdown.changed() => {
                debug!(pid, "sampler stopped by shutdown");
                return;
            }
        }

        let snapshot = match state.procfs.snapshot(pid) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                info!(pid, container = %tracked.identity.container, "process gone, emitting terminal event");
                let _ = finish_tx.send(tracked.terminal_event(Utc::now().timestamp()));
                return;
            }
            Err(e) => {
                // The process still exists but its stats were unreadable this
                // tick; skip the computation rather than aborting.
                debug!(pid, "transient stat read failure: {}", e);
                continue;
            }
        };

        let host = match state.procfs.host_snapshot() {
            Ok(host) => host,
            Err(e) => {
                warn!(pid, "transient host stat read failure: {}", e);
                continue;
            }
        };

        let event = tracked.advance(&snapshot, &host, Utc::now().timestamp());
        if usage_tx.send(event).is_err() {
            // Dispatcher is gone; the agent is shutting down.
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::{CpuTicks, CLK_TCK};
    use std::path::PathBuf;

    fn process_snapshot(pid: i32, cpu_ticks: f64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            comm: "java".to_string(),
            cwd: PathBuf::from(
                "/mnt1/yarn/usercache/hadoop/appcache/application_123/container_456",
            ),
            cpu_ticks,
            start_time: 1_700_000_070.0,
        }
    }

    fn host_snapshot(user_ticks: f64) -> HostCpuSnapshot {
        HostCpuSnapshot {
            ticks: CpuTicks {
                user: user_ticks,
                idle: 10_000.0,
                ..CpuTicks::default()
            },
        }
    }

    fn identity() -> ContainerIdentity {
        ContainerIdentity {
            application: "application_123".to_string(),
            container: "container_456".to_string(),
        }
    }

    #[test]
    fn test_one_second_of_four_is_25_percent() {
        // Process burns 1.0s of CPU while the host burns 4.0s in the same
        // window (100 and 400 ticks at USER_HZ = 100).
        let mut tracked =
            TrackedProcess::new(&process_snapshot(42, 500.0), &host_snapshot(2000.0), identity());

        let event = tracked.advance(&process_snapshot(42, 600.0), &host_snapshot(2400.0), 100);
        assert_eq!(event.cpu_usage, 25.0);
        assert!(!event.finished);
        assert_eq!(event.application, "application_123");
        assert_eq!(event.container, "container_456");
        assert!((event.process_time - 600.0 / *CLK_TCK).abs() < f64::EPSILON);
    }

    #[test]
    fn test_usage_is_computed_against_previous_sample_not_first_baseline() {
        let mut tracked =
            TrackedProcess::new(&process_snapshot(42, 0.0), &host_snapshot(0.0), identity());

        // First window: 50%.
        let first = tracked.advance(&process_snapshot(42, 200.0), &host_snapshot(400.0), 1);
        assert_eq!(first.cpu_usage, 50.0);

        // Second window: the process idles. Against the previous sample the
        // usage is 0; against the original baseline it would still read 25%.
        let second = tracked.advance(&process_snapshot(42, 200.0), &host_snapshot(800.0), 2);
        assert_eq!(second.cpu_usage, 0.0);
    }

    #[test]
    fn test_zero_host_delta_yields_zero_usage() {
        let mut tracked =
            TrackedProcess::new(&process_snapshot(42, 100.0), &host_snapshot(1000.0), identity());

        let event = tracked.advance(&process_snapshot(42, 150.0), &host_snapshot(1000.0), 1);
        assert_eq!(event.cpu_usage, 0.0);
    }

    #[test]
    fn test_terminal_event_carries_last_observed_deltas() {
        let mut tracked =
            TrackedProcess::new(&process_snapshot(42, 500.0), &host_snapshot(2000.0), identity());
        tracked.advance(&process_snapshot(42, 600.0), &host_snapshot(2400.0), 100);

        let terminal = tracked.terminal_event(200);
        assert!(terminal.finished);
        assert_eq!(terminal.cpu_usage, 25.0);
        assert_eq!(terminal.time, 200);
        assert!((terminal.process_time - 600.0 / *CLK_TCK).abs() < f64::EPSILON);
    }

    #[test]
    fn test_identity_fixed_for_lifetime() {
        let mut tracked =
            TrackedProcess::new(&process_snapshot(42, 0.0), &host_snapshot(0.0), identity());
        // Even if the process's cwd were to change, the identity captured at
        // start stays.
        let mut moved = process_snapshot(42, 10.0);
        moved.cwd = PathBuf::from("/somewhere/else");
        let event = tracked.advance(&moved, &host_snapshot(100.0), 1);
        assert_eq!(event.container, "container_456");
    }
}
