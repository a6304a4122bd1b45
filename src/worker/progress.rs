//! Progress Calculator — spec.md §4.6. A pure function from metrics (plus
//! task status) to a progress projection; no I/O, no shared state.

use serde::{Deserialize, Serialize};

use crate::domain::{Metrics, TaskStatus};

const GROUPS_WEIGHT: f64 = 0.10;
const POSTS_WEIGHT: f64 = 0.30;
const COMMENTS_WEIGHT: f64 = 0.60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Groups,
    Posts,
    Comments,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub processed: i64,
    pub total: i64,
    pub percentage: u8,
    pub phase: Phase,
}

/// `calculate(metrics) -> {processed,total,percentage,phase}` per spec.md
/// §4.6. `estimated_comments_per_post` is `progress.estimatedCommentsPerPost`
/// from configuration (default 15).
pub fn calculate(metrics: &Metrics, status: TaskStatus, estimated_comments_per_post: u32) -> Progress {
    let groups_progress = if metrics.groups_total > 0 {
        (metrics.groups_processed as f64 / metrics.groups_total as f64) * GROUPS_WEIGHT
    } else {
        0.0
    };

    let groups_resolved = metrics.groups_total > 0 && metrics.groups_processed >= metrics.groups_total;

    let posts_progress = if groups_resolved && metrics.posts_total > 0 {
        (metrics.posts_processed as f64 / metrics.posts_total as f64) * POSTS_WEIGHT
    } else {
        0.0
    };

    let comments_progress = if metrics.comments_total > 0 {
        ((metrics.comments_processed as f64 / metrics.comments_total as f64) * COMMENTS_WEIGHT)
            .min(COMMENTS_WEIGHT)
    } else {
        let est_comments =
            (metrics.posts_processed * estimated_comments_per_post as i64).max(1);
        ((metrics.comments_processed as f64 / est_comments as f64) * COMMENTS_WEIGHT)
            .min(COMMENTS_WEIGHT)
    };

    let fraction = groups_progress + posts_progress + comments_progress;
    let mut percentage = (fraction * 100.0).round().clamp(0.0, 100.0) as u8;

    if status == TaskStatus::Completed {
        percentage = 100;
    }

    let phase = if groups_progress < GROUPS_WEIGHT && metrics.groups_processed < metrics.groups_total
    {
        Phase::Groups
    } else if posts_progress < POSTS_WEIGHT
        && (metrics.posts_total == 0 || metrics.posts_processed < metrics.posts_total)
    {
        Phase::Posts
    } else {
        Phase::Comments
    };

    let (processed, total) = (
        metrics.groups_processed + metrics.posts_processed + metrics.comments_processed,
        metrics.groups_total + metrics.posts_total + metrics.comments_total,
    );

    Progress {
        processed,
        total,
        percentage,
        phase,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert;

    fn metrics(
        groups_total: i64,
        groups_processed: i64,
        posts_total: i64,
        posts_processed: i64,
        comments_total: i64,
        comments_processed: i64,
    ) -> Metrics {
        Metrics {
            groups_total,
            groups_processed,
            posts_total,
            posts_processed,
            comments_total,
            comments_processed,
            errors: 0,
        }
    }

    #[test]
    fn zero_metrics_is_zero_percent() {
        let p = calculate(&Metrics::default(), TaskStatus::Pending, 15);
        assert_eq!(p.percentage, 0);
        assert_eq!(p.phase, Phase::Groups);
    }

    #[test]
    fn completed_is_always_100() {
        let m = metrics(1, 0, 0, 0, 0, 0);
        let p = calculate(&m, TaskStatus::Completed, 15);
        assert_eq!(p.percentage, 100);
    }

    #[test]
    fn percentage_never_exceeds_100() {
        // comments_processed > estimate still clamps at the comments weight.
        let m = metrics(1, 1, 1, 1, 0, 1000);
        let p = calculate(&m, TaskStatus::Processing, 15);
        assert!(p.percentage <= 100);
    }

    #[test]
    fn s1_scenario_reaches_full_known_totals() {
        // spec.md §8 S1: single group, single post, two comments, all known.
        let m = metrics(1, 1, 1, 1, 2, 2);
        let p = calculate(&m, TaskStatus::Completed, 15);
        assert_eq!(p.percentage, 100);
    }

    #[test]
    fn estimate_used_when_comments_total_unknown() {
        let m = metrics(1, 1, 1, 1, 0, 15);
        let p = calculate(&m, TaskStatus::Processing, 15);
        // 1 post processed * 15 estimated comments per post == comments_processed
        // -> comments band fully earned, groups+posts bands also fully earned.
        assert_eq!(p.percentage, 100);
    }

    #[test]
    fn monotonic_as_processed_counters_increase() {
        let mut m = metrics(2, 0, 0, 0, 0, 0);
        let mut last = 0u8;
        for step in 0..=2 {
            m.groups_processed = step;
            let p = calculate(&m, TaskStatus::Processing, 15);
            assert!(p.percentage >= last);
            last = p.percentage;
        }
    }

    proptest::proptest! {
        #[test]
        fn percentage_always_in_bounds(
            groups_total in 0i64..50,
            groups_processed in 0i64..50,
            posts_total in 0i64..500,
            posts_processed in 0i64..500,
            comments_total in 0i64..5000,
            comments_processed in 0i64..5000,
        ) {
            let m = metrics(
                groups_total, groups_processed,
                posts_total, posts_processed,
                comments_total, comments_processed,
            );
            let p = calculate(&m, TaskStatus::Processing, 15);
            prop_assert!(p.percentage <= 100);
        }
    }
}
