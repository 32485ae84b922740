//! Evictor statistics.

/// Point-in-time counters for an evictor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictorStats {
    /// Lookups served from a resident entry.
    pub hits: u64,
    /// Lookups that called the factory's `create`.
    pub misses: u64,
    /// Misses where the factory reported no such object.
    pub not_found: u64,
    /// Entries handed back to the factory's `evict`.
    pub evictions: u64,
    /// Evictions whose down-call returned an error.
    pub eviction_failures: u64,
    /// Entries currently resident.
    pub resident: usize,
    /// Resident entries with at least one request in flight.
    pub in_use: usize,
}

impl EvictorStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evictor_stats_hit_rate() {
        let stats = EvictorStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = EvictorStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
