use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PoolId = i64;

/// Scores below this are counted as failed.
pub const PASS_THRESHOLD: f64 = 70.0;

/// Pools need strictly more candidates than this to show up on the dashboard.
pub const MIN_POOL_CANDIDATES: i64 = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub invited: bool,
    pub pool_id: Option<PoolId>,
    pub session_id: Option<i64>,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewPool {
    pub id: PoolId,
    pub name: String,
    pub invitation: Option<String>,
    pub created_on: DateTime<Utc>,
    pub num_candidates: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// One interview attempt. `details` holds the sub-category scores that were
/// present in the stored detail blob.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSession {
    pub id: i64,
    pub pool_id: PoolId,
    pub performance: Option<f64>,
    pub is_completed: bool,
    pub details: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "CSE")]
    Cse,
    #[serde(rename = "AI-DS")]
    AiDs,
    #[serde(rename = "ECE")]
    Ece,
    #[serde(rename = "IT")]
    It,
    #[serde(rename = "CIVIL")]
    Civil,
    #[serde(rename = "EEE")]
    Eee,
    #[serde(rename = "ME")]
    Me,
    #[serde(rename = "AI-ML")]
    AiMl,
    #[serde(rename = "CS&BS")]
    CsBs,
    Other,
}

impl Category {
    /// Every category in declaration order, which is also the derived `Ord`.
    #[cfg(test)]
    pub const fn ordered() -> [Category; 10] {
        [
            Self::Cse,
            Self::AiDs,
            Self::Ece,
            Self::It,
            Self::Civil,
            Self::Eee,
            Self::Me,
            Self::AiMl,
            Self::CsBs,
            Self::Other,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Cse => "CSE",
            Self::AiDs => "AI-DS",
            Self::Ece => "ECE",
            Self::It => "IT",
            Self::Civil => "CIVIL",
            Self::Eee => "EEE",
            Self::Me => "ME",
            Self::AiMl => "AI-ML",
            Self::CsBs => "CS&BS",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct CategorizedCandidate {
    pub candidate: Candidate,
    pub category: Category,
}

/// Average, failed and not-completed tallies. `average` is `None` when
/// nothing was scored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub average: Option<f64>,
    pub scored: usize,
    pub failed: usize,
    pub not_completed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoolPerformanceSummary {
    pub pool_id: PoolId,
    pub overall: PerformanceSummary,
    pub sub_categories: BTreeMap<String, PerformanceSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BranchPerformance {
    pub category: Category,
    pub summary: PerformanceSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCount {
    pub pool_id: PoolId,
    pub category: Category,
    pub count: usize,
}

/// Students of one enrollment year. `share_pct` is the unrounded share of
/// every counted student.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchCount {
    pub year: i32,
    pub count: usize,
    pub share_pct: f64,
}
