//! Weighted vote tally.
//!
//! A vote from a student whose region matches the topic's region counts
//! 1.0; any other region, including unknown or empty ones, counts 0.5.

use crate::db::Region;
use serde::Serialize;

pub const SAME_REGION_WEIGHT: f64 = 1.0;
pub const OTHER_REGION_WEIGHT: f64 = 0.5;

/// Derived vote counts for one topic. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tally {
    pub raw_count: u64,
    pub weighted_score: f64,
    pub same_region_count: u64,
    pub other_region_count: u64,
    /// Progress toward the threshold, rounded. Can exceed 100.
    pub percentage: u32,
    pub threshold_met: bool,
}

impl Tally {
    pub fn empty() -> Self {
        Tally {
            raw_count: 0,
            weighted_score: 0.0,
            same_region_count: 0,
            other_region_count: 0,
            percentage: 0,
            threshold_met: false,
        }
    }
}

/// Tallies the votes on a topic from `topic_region`, given the region of
/// each voter. `threshold` must be positive.
pub fn tally<'a, I>(topic_region: &Region, voter_regions: I, threshold: f64) -> Tally
where
    I: IntoIterator<Item = &'a Region>,
{
    let (same_region_count, other_region_count) =
        voter_regions
            .into_iter()
            .fold((0u64, 0u64), |(same, other), region| {
                if region == topic_region {
                    (same + 1, other)
                } else {
                    (same, other + 1)
                }
            });

    let weighted_score = same_region_count as f64 * SAME_REGION_WEIGHT
        + other_region_count as f64 * OTHER_REGION_WEIGHT;
    let percentage = (weighted_score / threshold * 100.0).round() as u32;

    Tally {
        raw_count: same_region_count + other_region_count,
        weighted_score,
        same_region_count,
        other_region_count,
        percentage,
        threshold_met: weighted_score >= threshold,
    }
}
