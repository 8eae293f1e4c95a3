//! Result classifier: partitions a session's result records into presentation buckets.
//!
//! Policy, checked in this order:
//! 1. status `Error`                         → Errors (score ignored)
//! 2. status `Match`                         → Strong Matches
//! 3. any other status with score ≥ 50       → Potential Matches
//! 4. status `No Match` with score < 50      → Not Suitable
//! 5. everything else                        → Unclassified
//!
//! A missing score fails every threshold comparison. Bucket 5 makes the
//! partition total; without it a record such as `("Potential", 30)` or
//! `("No Match", null)` would not be shown at all.

use std::fmt;

use crate::models::analysis::{MatchResult, MatchStatus};

/// Scores at or above this are at least a potential match.
pub const POTENTIAL_MATCH_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    StrongMatch,
    PotentialMatch,
    NotSuitable,
    Error,
    Unclassified,
}

impl Bucket {
    /// Display order on the results page.
    pub const ALL: [Bucket; 5] = [
        Bucket::StrongMatch,
        Bucket::PotentialMatch,
        Bucket::NotSuitable,
        Bucket::Error,
        Bucket::Unclassified,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Bucket::StrongMatch => "Strong Matches",
            Bucket::PotentialMatch => "Potential Matches",
            Bucket::NotSuitable => "Not Suitable",
            Bucket::Error => "Errors in Processing",
            Bucket::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

pub fn bucket_for(result: &MatchResult) -> Bucket {
    let meets_threshold = result
        .numerical_score
        .map_or(false, |score| score >= POTENTIAL_MATCH_THRESHOLD);
    let below_threshold = result
        .numerical_score
        .map_or(false, |score| score < POTENTIAL_MATCH_THRESHOLD);

    match &result.match_status {
        MatchStatus::Error => Bucket::Error,
        MatchStatus::Match => Bucket::StrongMatch,
        _ if meets_threshold => Bucket::PotentialMatch,
        MatchStatus::NoMatch if below_threshold => Bucket::NotSuitable,
        _ => Bucket::Unclassified,
    }
}

/// Five disjoint, order-preserving views over one result list.
#[derive(Debug, Default)]
pub struct Classification<'a> {
    pub strong: Vec<&'a MatchResult>,
    pub potential: Vec<&'a MatchResult>,
    pub not_suitable: Vec<&'a MatchResult>,
    pub errors: Vec<&'a MatchResult>,
    pub unclassified: Vec<&'a MatchResult>,
}

impl<'a> Classification<'a> {
    pub fn bucket(&self, bucket: Bucket) -> &[&'a MatchResult] {
        match bucket {
            Bucket::StrongMatch => &self.strong,
            Bucket::PotentialMatch => &self.potential,
            Bucket::NotSuitable => &self.not_suitable,
            Bucket::Error => &self.errors,
            Bucket::Unclassified => &self.unclassified,
        }
    }

    pub fn len(&self) -> usize {
        Bucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn classify(results: &[MatchResult]) -> Classification<'_> {
    let mut classification = Classification::default();
    for result in results {
        let target = match bucket_for(result) {
            Bucket::StrongMatch => &mut classification.strong,
            Bucket::PotentialMatch => &mut classification.potential,
            Bucket::NotSuitable => &mut classification.not_suitable,
            Bucket::Error => &mut classification.errors,
            Bucket::Unclassified => &mut classification.unclassified,
        };
        target.push(result);
    }
    classification
}
