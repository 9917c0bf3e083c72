//! Memory pressure signal for cache eviction.
//!
//! A [`MemoryProbe`] reports current usage against a limit. Platforms that
//! cannot report anything return `None`, and callers treat that as "no
//! pressure".

/// Fraction of the limit above which caches should be dropped.
pub const DEFAULT_PRESSURE_THRESHOLD: f64 = 0.7;

/// A usage sample in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapUsage {
    pub used: u64,
    pub limit: u64,
}

impl HeapUsage {
    /// `used / limit`, or 0 when the limit is unknown.
    pub fn ratio(&self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.used as f64 / self.limit as f64
        }
    }

    /// Whether usage is strictly above `threshold` of the limit.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.ratio() > threshold
    }
}

pub trait MemoryProbe {
    fn heap_usage(&self) -> Option<HeapUsage>;
}

/// Reports nothing; caches are never dropped for pressure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn heap_usage(&self) -> Option<HeapUsage> {
        None
    }
}

/// Resident set size of this process against a fixed byte budget.
///
/// Reads `VmRSS` from `/proc/self/status`, so it only reports on Linux.
#[derive(Debug, Clone, Copy)]
pub struct ProcessMemoryProbe {
    pub budget_bytes: u64,
}

impl ProcessMemoryProbe {
    pub fn new(budget_bytes: u64) -> Self {
        Self { budget_bytes }
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn heap_usage(&self) -> Option<HeapUsage> {
        if self.budget_bytes == 0 {
            return None;
        }
        let used = resident_bytes()?;
        Some(HeapUsage {
            used,
            limit: self.budget_bytes,
        })
    }
}

#[cfg(target_os = "linux")]
fn resident_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> Option<u64> {
    None
}

/// Extract `VmRSS:   1234 kB` as bytes.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kb * 1024)
}
