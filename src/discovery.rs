//! Periodic discovery of trackable container processes.
//!
//! Every tick the whole process table is enumerated and filtered down to JVM
//! container processes by command name and working directory markers. Newly
//! seen pids are registered and get a sampler task; pids that vanish mid-scan
//! are simply skipped, never treated as a scan failure.

use tokio::sync::{mpsc::UnboundedSender, watch};
use tracing::{debug, info};

use crate::config::Config;
use crate::event::UsageEvent;
use crate::procfs::ProcFs;
use crate::sampler;
use crate::state::SharedState;

/// Filter deciding which processes count as trackable containers.
#[derive(Debug, Clone)]
pub struct ProcessFilter {
    pub process_name: String,
    pub application_marker: String,
    pub container_marker: String,
}

impl ProcessFilter {
    pub fn from_config(config: &Config) -> Self {
        Self {
            process_name: config.process_name().to_string(),
            application_marker: config.application_marker().to_string(),
            container_marker: config.container_marker().to_string(),
        }
    }

    /// A process qualifies when its command name matches exactly and its
    /// working directory carries both the application and container markers.
    pub fn matches(&self, comm: &str, cwd: &std::path::Path) -> bool {
        if comm != self.process_name {
            return false;
        }
        let cwd = cwd.to_string_lossy();
        cwd.contains(&self.application_marker) && cwd.contains(&self.container_marker)
    }
}

/// One discovery pass: all pids currently matching the filter.
///
/// A pid whose comm or cwd cannot be read (it exited mid-scan, or belongs to
/// another user) is skipped and the pass continues.
pub fn scan(procfs: &ProcFs, filter: &ProcessFilter) -> Vec<i32> {
    let mut matching = Vec::new();
    for pid in procfs.enumerate() {
        let comm = match procfs.comm(pid) {
            Ok(comm) => comm,
            Err(_) => continue,
        };
        if comm != filter.process_name {
            continue;
        }
        let cwd = match procfs.cwd(pid) {
            Ok(cwd) => cwd,
            Err(_) => continue,
        };
        if !filter.matches(&comm, &cwd) {
            continue;
        }
        matching.push(pid);
    }
    matching
}

/// Discovery loop. Spawns a sampler for every candidate pid that is not
/// already registered; a losing `register` call must not spawn a second
/// sampler. Runs until the shutdown signal fires.
pub async fn run(
    state: SharedState,
    usage_tx: UnboundedSender<UsageEvent>,
    finish_tx: UnboundedSender<UsageEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        interval_secs = state.discovery_interval.as_secs_f64(),
        process_name = %state.filter.process_name,
        "discovery loop started"
    );

    loop {
        let candidates = scan(&state.procfs, &state.filter);
        debug!(count = candidates.len(), "discovery pass complete");

        // Forget skipped pids once their process leaves the table, so a
        // reused pid gets evaluated fresh.
        state.skipped.retain(|pid| candidates.contains(&pid));

        for pid in candidates {
            if state.skipped.contains(pid) {
                continue;
            }
            if !state.registry.register(pid) {
                continue;
            }
            info!(pid, "tracking new container process");
            tokio::spawn(sampler::run(
                state.clone(),
                pid,
                usage_tx.clone(),
                finish_tx.clone(),
                shutdown.clone(),
            ));
        }

        tokio::select! {
            _ = tokio::time::sleep(state.discovery_interval) => {}
            _ = shutdown.changed() => {
                info!("discovery loop stopped");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn filter() -> ProcessFilter {
        ProcessFilter {
            process_name: "java".to_string(),
            application_marker: "application".to_string(),
            container_marker: "container".to_string(),
        }
    }

    fn add_proc(root: &Path, pid: i32, comm: &str, cwd: &str) {
        let dir = root.join(pid.to_string());
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
        std::os::unix::fs::symlink(cwd, dir.join("cwd")).unwrap();
    }

    #[test]
    fn test_filter_requires_name_and_both_markers() {
        let f = filter();
        let container_cwd =
            Path::new("/mnt1/yarn/usercache/hadoop/appcache/application_1/container_1");
        assert!(f.matches("java", container_cwd));
        assert!(!f.matches("python", container_cwd));
        assert!(!f.matches("java", Path::new("/home/hadoop/application_1")));
        assert!(!f.matches("java", Path::new("/var/lib/container_1")));
    }

    #[test]
    fn test_scan_filters_process_table() {
        let root = tempdir().expect("tempdir");
        add_proc(
            root.path(),
            100,
            "java",
            "/mnt1/yarn/usercache/hadoop/appcache/application_1/container_1",
        );
        add_proc(
            root.path(),
            200,
            "java",
            "/opt/service", // JVM, but not a container
        );
        add_proc(
            root.path(),
            300,
            "python",
            "/mnt1/yarn/usercache/hadoop/appcache/application_1/container_2",
        );

        let procfs = ProcFs::new(root.path());
        let pids = scan(&procfs, &filter());
        assert_eq!(pids, vec![100]);
    }

    #[test]
    fn test_scan_skips_unreadable_entries() {
        let root = tempdir().expect("tempdir");
        add_proc(
            root.path(),
            100,
            "java",
            "/mnt1/yarn/usercache/hadoop/appcache/application_1/container_1",
        );
        // pid dir without comm/cwd, as if the process exited mid-scan
        fs::create_dir(root.path().join("200")).unwrap();

        let procfs = ProcFs::new(root.path());
        let pids = scan(&procfs, &filter());
        assert_eq!(pids, vec![100]);
    }
}
