//! Storage usage reporting

use serde::{Deserialize, Serialize};

use super::newtypes::FileId;

/// Server-side footprint of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUsage {
    pub file_id: FileId,
    pub size_bytes: u64,
}

/// A byte count and its human-readable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageItemMetric {
    pub exact: u64,
    pub readable: String,
}

impl UsageItemMetric {
    pub fn new(exact: u64) -> Self {
        Self {
            exact,
            readable: bytes_to_human(exact),
        }
    }
}

/// Usage as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetrics {
    pub usages: Vec<FileUsage>,
    pub server_usage: UsageItemMetric,
    pub data_cap: UsageItemMetric,
}

impl UsageMetrics {
    pub fn new(usages: Vec<FileUsage>, data_cap: u64) -> Self {
        let total = usages.iter().map(|u| u.size_bytes).sum();
        Self {
            usages,
            server_usage: UsageItemMetric::new(total),
            data_cap: UsageItemMetric::new(data_cap),
        }
    }

    /// Fraction of the cap in use, 0.0 to 1.0 and beyond when over
    pub fn fraction_used(&self) -> f64 {
        if self.data_cap.exact == 0 {
            return 0.0;
        }
        self.server_usage.exact as f64 / self.data_cap.exact as f64
    }
}

/// Plaintext size of every document on this device
pub type UncompressedUsage = UsageItemMetric;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with a decimal unit, e.g. `1.5 MB`
pub fn bytes_to_human(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        let rounded = (value * 100.0).round() / 100.0;
        format!("{rounded} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_to_human() {
        assert_eq!(bytes_to_human(0), "0 B");
        assert_eq!(bytes_to_human(999), "999 B");
        assert_eq!(bytes_to_human(1_000), "1 KB");
        assert_eq!(bytes_to_human(1_500_000), "1.5 MB");
        assert_eq!(bytes_to_human(2_340_000_000), "2.34 GB");
    }

    #[test]
    fn test_metrics_totals() {
        let metrics = UsageMetrics::new(
            vec![
                FileUsage {
                    file_id: FileId::new(),
                    size_bytes: 1_000,
                },
                FileUsage {
                    file_id: FileId::new(),
                    size_bytes: 1_500,
                },
            ],
            1_000_000,
        );
        assert_eq!(metrics.server_usage.exact, 2_500);
        assert_eq!(metrics.server_usage.readable, "2.5 KB");
        assert!((metrics.fraction_used() - 0.0025).abs() < f64::EPSILON);
    }
}
