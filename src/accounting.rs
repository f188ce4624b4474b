//! CPU tick accounting.
//!
//! Pure functions turning raw `/proc` tick breakdowns into comparable
//! cumulative totals and interval usage percentages. All inputs are
//! monotonically non-decreasing counters; usage is always computed from the
//! delta between two consecutive samples.

use once_cell::sync::Lazy;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Convert a cumulative tick count into seconds of CPU time.
pub fn ticks_to_seconds(ticks: f64) -> f64 {
    ticks / *CLK_TCK
}

/// Cumulative CPU tick breakdown, as reported by the `cpu` line of
/// `/proc/stat` (aggregated over all cores) or derived per process.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTicks {
    pub user: f64,
    pub nice: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub softirq: f64,
    pub steal: f64,
    pub guest: f64,
    pub guest_nice: f64,
}

impl CpuTicks {
    /// Total CPU time across all states, in ticks.
    ///
    /// Guest time is already accounted inside `user`/`nice` by the kernel, so
    /// it is subtracted there and re-added as its own bucket. The result is a
    /// monotonically non-decreasing counter covering every CPU state on every
    /// core.
    pub fn total(&self) -> f64 {
        let user = self.user - self.guest;
        let nice = self.nice - self.guest_nice;
        let idle_all = self.idle + self.iowait;
        let system_all = self.system + self.irq + self.softirq;
        let virt_all = self.guest + self.guest_nice;

        user + nice + system_all + idle_all + self.steal + virt_all
    }
}

/// Interval CPU usage as a percentage of host capacity.
///
/// Both deltas must come from the same sampling window. A host delta of zero
/// (no observable time elapsed between reads, or a clock quirk) yields `0.0`
/// rather than a division fault; callers can treat such a sample as "no
/// measurable usage".
pub fn usage_percent(process_delta: f64, host_delta: f64) -> f64 {
    if host_delta <= 0.0 {
        return 0.0;
    }
    process_delta / host_delta * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticks(user: f64, system: f64, idle: f64) -> CpuTicks {
        CpuTicks {
            user,
            system,
            idle,
            ..CpuTicks::default()
        }
    }

    #[test]
    fn test_total_covers_all_states() {
        let t = CpuTicks {
            user: 100.0,
            nice: 10.0,
            system: 50.0,
            idle: 800.0,
            iowait: 20.0,
            irq: 5.0,
            softirq: 5.0,
            steal: 10.0,
            guest: 0.0,
            guest_nice: 0.0,
        };
        assert_eq!(t.total(), 1000.0);
    }

    #[test]
    fn test_total_guest_time_not_double_counted() {
        // The kernel includes guest ticks inside user/nice; the total must
        // count them exactly once.
        let without_guest = ticks(100.0, 50.0, 850.0);
        let with_guest = CpuTicks {
            user: 100.0, // includes 30 ticks of guest
            guest: 30.0,
            system: 50.0,
            idle: 850.0,
            ..CpuTicks::default()
        };
        assert_eq!(without_guest.total(), 1000.0);
        assert_eq!(with_guest.total(), 1000.0);
    }

    #[test]
    fn test_usage_percent_quarter_of_host() {
        // process delta 100 ticks over a host delta of 400 ticks -> 25%
        assert_eq!(usage_percent(100.0, 400.0), 25.0);
    }

    #[test]
    fn test_usage_percent_zero_host_delta() {
        // A zero host delta is a defined sentinel, not a division fault.
        assert_eq!(usage_percent(10.0, 0.0), 0.0);
        assert_eq!(usage_percent(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_ticks_to_seconds_uses_clock_rate() {
        let secs = ticks_to_seconds(1500.0);
        let expected = 1500.0 / *CLK_TCK;
        assert!((secs - expected).abs() < f64::EPSILON);
    }
}
