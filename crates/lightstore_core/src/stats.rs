//! Repository statistics.

/// A point-in-time view of a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    /// Current size of the mapped region in bytes.
    pub map_size: usize,
    /// Growth steps taken since the repository was opened.
    pub growth_events: u64,
    /// Number of stored entries.
    pub entries: u64,
}

impl RepositoryStats {
    /// Average mapped bytes per entry, or `None` for an empty repository.
    #[must_use]
    pub fn bytes_per_entry(&self) -> Option<u64> {
        (self.entries > 0).then(|| self.map_size as u64 / self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_per_entry() {
        let stats = RepositoryStats {
            map_size: 4096,
            growth_events: 0,
            entries: 16,
        };
        assert_eq!(stats.bytes_per_entry(), Some(256));
        assert_eq!(RepositoryStats::default().bytes_per_entry(), None);
    }
}
