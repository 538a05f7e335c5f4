//! Process inspection through `/proc`.

use std::fs;
use std::time::Duration;

const FALLBACK_CLK_TCK: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStat {
    pub state: char,
    pub utime: u64,
    pub stime: u64,
    /// Start time in clock ticks after boot. Together with the pid it
    /// identifies one process incarnation.
    pub start_ticks: u64,
}

pub fn read_stat(pid: u32) -> Option<ProcStat> {
    let content = fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    parse_stat(&content)
}

/// Parse `/proc/<pid>/stat`. The command name may contain spaces and
/// parentheses, so fields are counted from the last `)`.
fn parse_stat(content: &str) -> Option<ProcStat> {
    let rest = &content[content.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    Some(ProcStat {
        state: fields.first()?.chars().next()?,
        utime: fields.get(11)?.parse().ok()?,
        stime: fields.get(12)?.parse().ok()?,
        start_ticks: fields.get(19)?.parse().ok()?,
    })
}

/// Whether `pid` is a live (not zombie) process, and still the same
/// incarnation when `start_ticks` is known.
pub fn is_alive(pid: u32, start_ticks: Option<u64>) -> bool {
    match read_stat(pid) {
        Some(stat) => {
            !matches!(stat.state, 'Z' | 'X' | 'x')
                && (start_ticks.is_none() || start_ticks == Some(stat.start_ticks))
        }
        None => false,
    }
}

/// Resident set size in bytes.
pub fn rss_bytes(pid: u32) -> u64 {
    fs::read_to_string(format!("/proc/{pid}/status"))
        .ok()
        .and_then(|s| parse_vm_rss(&s))
        .unwrap_or(0)
}

fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

/// Lifetime-average CPU usage in percent of one core.
pub fn cpu_percent(pid: u32) -> f32 {
    let Some(stat) = read_stat(pid) else {
        return 0.0;
    };
    let Some(uptime) = system_uptime() else {
        return 0.0;
    };
    let tck = clock_ticks_per_second() as f64;
    let elapsed = uptime.as_secs_f64() - stat.start_ticks as f64 / tck;
    if elapsed <= 0.0 {
        return 0.0;
    }
    let busy = (stat.utime + stat.stime) as f64 / tck;
    (busy / elapsed * 100.0) as f32
}

fn system_uptime() -> Option<Duration> {
    let content = fs::read_to_string("/proc/uptime").ok()?;
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    Some(Duration::from_secs_f64(secs))
}

#[allow(unsafe_code)]
fn clock_ticks_per_second() -> u64 {
    // SAFETY: sysconf only reads a system constant; no pointers involved.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks)
        .ok()
        .filter(|t| *t > 0)
        .unwrap_or(FALLBACK_CLK_TCK)
}
