use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::classify;
use crate::models::{
    BatchCount, BranchPerformance, CategorizedCandidate, Category, CategoryCount, InterviewSession,
    PerformanceSummary, PoolId, PoolPerformanceSummary, PASS_THRESHOLD,
};

#[derive(Debug, Default, Clone)]
struct ScoreTally {
    total: f64,
    scored: usize,
    failed: usize,
    not_completed: usize,
}

impl ScoreTally {
    fn record(&mut self, score: Option<f64>, is_completed: bool) {
        if let Some(score) = score {
            self.total += score;
            self.scored += 1;
            if score < PASS_THRESHOLD {
                self.failed += 1;
            }
        }
        if !is_completed {
            self.not_completed += 1;
        }
    }

    fn finish(&self) -> PerformanceSummary {
        PerformanceSummary {
            average: (self.scored > 0).then(|| self.total / self.scored as f64),
            scored: self.scored,
            failed: self.failed,
            not_completed: self.not_completed,
        }
    }
}

#[derive(Debug, Default)]
struct PoolTally {
    overall: ScoreTally,
    sub_categories: BTreeMap<String, ScoreTally>,
}

/// Per-pool category counts, one row per category present in the pool.
/// Rows follow `pool_ids` order, then `Category` order within a pool.
pub fn category_counts(
    pool_ids: &[PoolId],
    candidates: &[CategorizedCandidate],
) -> Vec<CategoryCount> {
    let mut rows = Vec::new();

    for &pool_id in pool_ids {
        let mut counts: BTreeMap<Category, usize> = BTreeMap::new();
        for entry in candidates
            .iter()
            .filter(|entry| entry.candidate.pool_id == Some(pool_id))
        {
            *counts.entry(entry.category).or_insert(0) += 1;
        }

        rows.extend(counts.into_iter().map(|(category, count)| CategoryCount {
            pool_id,
            category,
            count,
        }));
    }

    rows
}

/// One summary per requested pool, in `pool_ids` order. Pools without
/// sessions get an empty summary (no average, zero counts). Sub-categories
/// only aggregate over the sessions whose details mention them.
pub fn pool_performance(
    pool_ids: &[PoolId],
    sessions: &[InterviewSession],
) -> Vec<PoolPerformanceSummary> {
    let mut tallies: HashMap<PoolId, PoolTally> = pool_ids
        .iter()
        .map(|&pool_id| (pool_id, PoolTally::default()))
        .collect();

    for session in sessions {
        let Some(tally) = tallies.get_mut(&session.pool_id) else {
            debug!(
                session_id = session.id,
                pool_id = session.pool_id,
                "session outside requested pools"
            );
            continue;
        };

        tally
            .overall
            .record(session.performance, session.is_completed);

        for (sub_category, score) in &session.details {
            tally
                .sub_categories
                .entry(sub_category.clone())
                .or_default()
                .record(Some(*score), session.is_completed);
        }
    }

    let mut seen = Vec::with_capacity(pool_ids.len());
    pool_ids
        .iter()
        .filter(|pool_id| {
            if seen.contains(*pool_id) {
                false
            } else {
                seen.push(**pool_id);
                true
            }
        })
        .map(|pool_id| {
            let tally = tallies.remove(pool_id).unwrap_or_default();
            PoolPerformanceSummary {
                pool_id: *pool_id,
                overall: tally.overall.finish(),
                sub_categories: tally
                    .sub_categories
                    .iter()
                    .map(|(name, sub)| (name.clone(), sub.finish()))
                    .collect(),
            }
        })
        .collect()
}

/// Performance per branch for the given sessions. A session is attributed to
/// the first categorized candidate holding its id; unmatched sessions are skipped.
pub fn branch_performance(
    sessions: &[InterviewSession],
    candidates: &[CategorizedCandidate],
) -> Vec<BranchPerformance> {
    let mut category_by_session: HashMap<i64, Category> = HashMap::new();
    for entry in candidates {
        if let Some(session_id) = entry.candidate.session_id {
            category_by_session
                .entry(session_id)
                .or_insert(entry.category);
        }
    }

    let mut tallies: BTreeMap<Category, ScoreTally> = BTreeMap::new();
    for session in sessions {
        let Some(category) = category_by_session.get(&session.id) else {
            continue;
        };
        tallies
            .entry(*category)
            .or_default()
            .record(session.performance, session.is_completed);
    }

    tallies
        .into_iter()
        .map(|(category, tally)| BranchPerformance {
            category,
            summary: tally.finish(),
        })
        .collect()
}

/// Counts emails by enrollment batch, oldest first, with each batch's share
/// of all counted emails.
pub fn batch_counts<S: AsRef<str>>(emails: &[S]) -> Vec<BatchCount> {
    let mut counts: BTreeMap<i32, usize> = BTreeMap::new();
    for email in emails {
        if let Some(year) = classify::batch_year(email.as_ref()) {
            *counts.entry(year).or_insert(0) += 1;
        }
    }

    let total: usize = counts.values().sum();
    counts
        .into_iter()
        .map(|(year, count)| BatchCount {
            year,
            count,
            share_pct: count as f64 * 100.0 / total as f64,
        })
        .collect()
}
