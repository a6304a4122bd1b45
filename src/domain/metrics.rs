//! Task progress metrics — spec.md §3 ("Metrics").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub groups_total: i64,
    pub groups_processed: i64,
    pub posts_total: i64,
    pub posts_processed: i64,
    pub comments_total: i64,
    pub comments_processed: i64,
    pub errors: i64,
}

/// Additive delta applied via `Store::increment_metrics`. Any field left at
/// zero leaves the corresponding metric untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsDelta {
    pub groups_total: i64,
    pub groups_processed: i64,
    pub posts_total: i64,
    pub posts_processed: i64,
    pub comments_total: i64,
    pub comments_processed: i64,
    pub errors: i64,
}

impl Metrics {
    /// Apply a delta, clamping every field at zero — deltas are additive
    /// and must never drive a counter negative (spec.md §4.1).
    pub fn apply(&mut self, delta: MetricsDelta) {
        self.groups_total = (self.groups_total + delta.groups_total).max(0);
        self.groups_processed = (self.groups_processed + delta.groups_processed).max(0);
        self.posts_total = (self.posts_total + delta.posts_total).max(0);
        self.posts_processed = (self.posts_processed + delta.posts_processed).max(0);
        self.comments_total = (self.comments_total + delta.comments_total).max(0);
        self.comments_processed = (self.comments_processed + delta.comments_processed).max(0);
        self.errors = (self.errors + delta.errors).max(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_never_goes_negative() {
        let mut m = Metrics::default();
        m.apply(MetricsDelta {
            errors: -5,
            ..Default::default()
        });
        assert_eq!(m.errors, 0);
    }

    #[test]
    fn apply_accumulates() {
        let mut m = Metrics::default();
        m.apply(MetricsDelta {
            posts_processed: 3,
            ..Default::default()
        });
        m.apply(MetricsDelta {
            posts_processed: 2,
            ..Default::default()
        });
        assert_eq!(m.posts_processed, 5);
    }
}
