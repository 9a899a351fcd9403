//! Sidecar metadata for cached artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nuload_core::PackageIdentity;

/// What the cache knows about one stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub id: String,
    pub version: String,
    /// Location of the source the artifact came from
    pub origin: String,
    /// BLAKE3 of the artifact bytes, hex encoded
    pub blake3: String,
    /// Size in bytes
    pub size: u64,
    /// When the entry was stored (unix seconds)
    pub stored_at: i64,
    /// When the entry was last read (unix seconds)
    pub last_accessed: i64,
}

impl ArtifactEntry {
    pub fn new(identity: &PackageIdentity, origin: &str, blake3: String, size: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            id: identity.id.clone(),
            version: identity.version.to_string(),
            origin: origin.to_string(),
            blake3,
            size,
            stored_at: now,
            last_accessed: now,
        }
    }

    /// Update last accessed time
    pub fn touch(&mut self) {
        self.last_accessed = Utc::now().timestamp();
    }

    /// Get age of entry in seconds
    pub fn age_seconds(&self) -> i64 {
        Utc::now().timestamp() - self.stored_at
    }

    /// Get last_accessed as DateTime
    pub fn last_accessed_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_accessed, 0).unwrap_or_else(Utc::now)
    }
}

/// Totals over a set of cache entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSummary {
    /// Number of artifacts
    pub entries: usize,
    /// Bytes on disk
    pub total_size: u64,
}

impl CacheSummary {
    pub fn add(&mut self, entry: &ArtifactEntry) {
        self.entries += 1;
        self.total_size += entry.size;
    }

    /// Format size in human-readable format
    pub fn format_size(&self) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = self.total_size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", self.total_size, UNITS[unit_index])
        } else {
            format!("{:.1} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_timestamps() {
        let identity = PackageIdentity::new("Foo", "1.0.0".parse().unwrap());
        let mut entry = ArtifactEntry::new(&identity, "memory://feed", "ab".repeat(32), 10);
        assert_eq!(entry.version, "1.0.0");
        assert!(entry.age_seconds() >= 0);

        entry.last_accessed = 0;
        entry.touch();
        assert!(entry.last_accessed > 0);
        assert_eq!(entry.last_accessed_datetime().timestamp(), entry.last_accessed);
    }

    #[test]
    fn test_summary_formatting() {
        let small = CacheSummary {
            entries: 1,
            total_size: 512,
        };
        assert_eq!(small.format_size(), "512 B");

        let medium = CacheSummary {
            entries: 5,
            total_size: 1536,
        };
        assert_eq!(medium.format_size(), "1.5 KB");

        let large = CacheSummary {
            entries: 100,
            total_size: 1024 * 1024 * 1024 + 512 * 1024 * 1024,
        };
        assert_eq!(large.format_size(), "1.5 GB");
    }
}
