//! Process inspection via the /proc filesystem.
//!
//! Everything is rooted at a configurable directory so tests can point the
//! reader at a synthetic proc tree. Any per-pid lookup may legitimately fail
//! with [`AgentError::NotFound`] because the process exited between
//! enumeration and inspection; callers treat that as an expected outcome.

use std::fs;
use std::path::{Path, PathBuf};

use crate::accounting::CpuTicks;
use crate::error::AgentError;

/// Point-in-time view of a single process.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot {
    pub pid: i32,
    /// Command name from `/proc/<pid>/comm`.
    pub comm: String,
    /// Working directory, resolved from the `cwd` symlink.
    pub cwd: PathBuf,
    /// Cumulative user+system CPU time in ticks.
    pub cpu_ticks: f64,
    /// Process start time as unix seconds (boot time + starttime field).
    pub start_time: f64,
}

/// Aggregated tick breakdown over all cores, from the `cpu` line of
/// `/proc/stat`.
#[derive(Debug, Clone, Copy)]
pub struct HostCpuSnapshot {
    pub ticks: CpuTicks,
}

impl HostCpuSnapshot {
    /// Total host CPU ticks across all states.
    pub fn total(&self) -> f64 {
        self.ticks.total()
    }
}

/// Rooted /proc reader.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn pid_path(&self, pid: i32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    /// List all pids currently present in the process table.
    ///
    /// Unreadable entries are skipped; an unreadable root yields an empty
    /// list rather than an error.
    pub fn enumerate(&self) -> Vec<i32> {
        let mut pids = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let name = match entry.file_name().into_string() {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if !name.chars().all(|c| c.is_ascii_digit()) {
                    continue;
                }
                if let Ok(pid) = name.parse::<i32>() {
                    pids.push(pid);
                }
            }
        }
        pids
    }

    /// Command name from `/proc/<pid>/comm`.
    pub fn comm(&self, pid: i32) -> Result<String, AgentError> {
        let content =
            fs::read_to_string(self.pid_path(pid).join("comm")).map_err(map_not_found(pid))?;
        Ok(content.trim().to_string())
    }

    /// Working directory from the `/proc/<pid>/cwd` symlink.
    pub fn cwd(&self, pid: i32) -> Result<PathBuf, AgentError> {
        fs::read_link(self.pid_path(pid).join("cwd")).map_err(map_not_found(pid))
    }

    /// Full point-in-time snapshot of one process.
    pub fn snapshot(&self, pid: i32) -> Result<ProcessSnapshot, AgentError> {
        let comm = self.comm(pid)?;
        let cwd = self.cwd(pid)?;
        let stat_path = self.pid_path(pid).join("stat");
        let content = fs::read_to_string(&stat_path).map_err(map_not_found(pid))?;
        let (cpu_ticks, starttime) = parse_pid_stat(&content)
            .map_err(|reason| AgentError::MalformedStat {
                file: stat_path.display().to_string(),
                reason,
            })?;

        let start_time = self.boot_time()? + starttime / *crate::accounting::CLK_TCK;

        Ok(ProcessSnapshot {
            pid,
            comm,
            cwd,
            cpu_ticks,
            start_time,
        })
    }

    /// Host-wide cumulative CPU ticks from the aggregate `cpu` line.
    pub fn host_snapshot(&self) -> Result<HostCpuSnapshot, AgentError> {
        let stat_path = self.root.join("stat");
        let content = fs::read_to_string(&stat_path)?;
        let ticks = parse_host_cpu_line(&content).ok_or_else(|| AgentError::MalformedStat {
            file: stat_path.display().to_string(),
            reason: "no aggregate cpu line found".to_string(),
        })?;
        Ok(HostCpuSnapshot { ticks })
    }

    /// System boot time (unix seconds) from the `btime` line of `/proc/stat`.
    pub fn boot_time(&self) -> Result<f64, AgentError> {
        let stat_path = self.root.join("stat");
        let content = fs::read_to_string(&stat_path)?;
        for line in content.lines() {
            if let Some(value) = line.strip_prefix("btime ") {
                if let Ok(btime) = value.trim().parse::<f64>() {
                    return Ok(btime);
                }
            }
        }
        Err(AgentError::MalformedStat {
            file: stat_path.display().to_string(),
            reason: "no btime line found".to_string(),
        })
    }
}

/// Wrap a missing pid directory as `NotFound`; other IO errors pass through.
fn map_not_found(pid: i32) -> impl Fn(std::io::Error) -> AgentError {
    move |e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AgentError::NotFound(pid)
        } else {
            AgentError::Io(e)
        }
    }
}

/// Parse `(utime + stime, starttime)` in ticks from a `/proc/<pid>/stat`
/// line.
///
/// The comm field is parenthesized and may itself contain spaces or `)`, so
/// fields are counted from the last closing parenthesis. After comm, `state`
/// is field 0, utime field 11, stime field 12 and starttime field 19.
fn parse_pid_stat(content: &str) -> Result<(f64, f64), String> {
    let rest = content
        .rfind(')')
        .map(|i| &content[i + 1..])
        .ok_or_else(|| "missing comm field".to_string())?;

    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() <= 19 {
        return Err(format!(
            "expected at least 20 fields after comm, got {}",
            fields.len()
        ));
    }

    let utime: f64 = fields[11]
        .parse()
        .map_err(|_| "unparseable utime field".to_string())?;
    let stime: f64 = fields[12]
        .parse()
        .map_err(|_| "unparseable stime field".to_string())?;
    let starttime: f64 = fields[19]
        .parse()
        .map_err(|_| "unparseable starttime field".to_string())?;

    Ok((utime + stime, starttime))
}

/// Parse the aggregate `cpu ` line of `/proc/stat` into a tick breakdown.
///
/// Kernels older than 2.6.24 omit the trailing guest fields; missing fields
/// read as zero.
fn parse_host_cpu_line(content: &str) -> Option<CpuTicks> {
    for line in content.lines() {
        if !line.starts_with("cpu ") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            return None;
        }
        let field = |i: usize| -> f64 {
            parts
                .get(i)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        return Some(CpuTicks {
            user: field(1),
            nice: field(2),
            system: field(3),
            idle: field(4),
            iowait: field(5),
            irq: field(6),
            softirq: field(7),
            steal: field(8),
            guest: field(9),
            guest_nice: field(10),
        });
    }
    None
}
