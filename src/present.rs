use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use crate::models::{
    BatchCount, BranchPerformance, Category, CategoryCount, InterviewPool, InterviewSession,
    PoolId, PoolPerformanceSummary,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const METRIC_FAILED: &str = "Number of Students Failed";
pub const METRIC_NOT_COMPLETED: &str = "Number of Students Not Completed";

/// Averages are kept at full precision until they reach a view.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Pool id to display name lookup.
#[derive(Debug, Clone, Default)]
pub struct PoolDirectory {
    names: HashMap<PoolId, String>,
}

impl PoolDirectory {
    pub fn from_pools(pools: &[InterviewPool]) -> Self {
        Self {
            names: pools
                .iter()
                .map(|pool| (pool.id, pool.name.clone()))
                .collect(),
        }
    }

    pub fn name(&self, pool_id: PoolId) -> Option<&str> {
        self.names.get(&pool_id).map(String::as_str)
    }

    /// Unmatched ids point at stale or partial source data; the caller drops the row.
    fn resolve(&self, pool_id: PoolId, view: &'static str) -> Option<&str> {
        let name = self.name(pool_id);
        if name.is_none() {
            warn!(pool_id, view, "no pool name for pool id; dropping row");
        }
        name
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchRow {
    pub batch: i32,
    pub students: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolOverviewRow {
    pub pool_id: PoolId,
    pub name: String,
    pub invitation: Option<String>,
    pub created_on: String,
    pub candidates: i64,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolCategoryRow {
    pub pool_name: String,
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolTotalRow {
    pub pool_name: String,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CategoryPoolRow {
    pub category: Category,
    pub pool_id: PoolId,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolPerformanceRow {
    pub pool_name: String,
    pub average_score: Option<f64>,
    pub failed: usize,
    pub not_completed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubCategoryRow {
    pub pool_name: String,
    pub average_score: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubCategoryTable {
    pub sub_category: String,
    pub title: String,
    pub rows: Vec<SubCategoryRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchCountRow {
    pub category: Category,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchPerformanceRow {
    pub category: Category,
    pub average_score: Option<f64>,
    pub failed: usize,
    pub not_completed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricRow {
    pub category: Category,
    pub metric: &'static str,
    pub value: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionScoreRow {
    pub index: usize,
    pub session_id: i64,
    pub performance: Option<f64>,
}

pub fn batch_rows(counts: &[BatchCount]) -> Vec<BatchRow> {
    counts
        .iter()
        .map(|entry| BatchRow {
            batch: entry.year,
            students: entry.count,
            share_pct: round1(entry.share_pct),
        })
        .collect()
}

pub fn pool_overview_rows(pools: &[InterviewPool]) -> Vec<PoolOverviewRow> {
    pools
        .iter()
        .map(|pool| PoolOverviewRow {
            pool_id: pool.id,
            name: pool.name.clone(),
            invitation: pool.invitation.clone(),
            created_on: pool.created_on.date_naive().to_string(),
            candidates: pool.num_candidates,
            start_time: pool
                .start_time
                .map(|ts| ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()),
            end_time: pool
                .end_time
                .map(|ts| ts.naive_utc().format(TIMESTAMP_FORMAT).to_string()),
        })
        .collect()
}

/// Joins counts to pool names and merges rows that share a pool name and
/// category. Rows keep first-seen order.
pub fn pool_category_rows(
    directory: &PoolDirectory,
    counts: &[CategoryCount],
) -> Vec<PoolCategoryRow> {
    let mut rows: Vec<PoolCategoryRow> = Vec::new();
    for count in counts {
        let Some(pool_name) = directory.resolve(count.pool_id, "pool categories") else {
            continue;
        };
        match rows
            .iter_mut()
            .find(|row| row.pool_name == pool_name && row.category == count.category)
        {
            Some(row) => row.count += count.count,
            None => rows.push(PoolCategoryRow {
                pool_name: pool_name.to_string(),
                category: count.category,
                count: count.count,
            }),
        }
    }
    rows
}

pub fn pool_totals(rows: &[PoolCategoryRow]) -> Vec<PoolTotalRow> {
    let mut totals: Vec<PoolTotalRow> = Vec::new();
    for row in rows {
        match totals.iter_mut().find(|total| total.pool_name == row.pool_name) {
            Some(total) => total.total += row.count,
            None => totals.push(PoolTotalRow {
                pool_name: row.pool_name.clone(),
                total: row.count,
            }),
        }
    }
    totals
}

/// Branch distribution keyed by pool id, for grouped bars per category.
pub fn category_pool_rows(counts: &[CategoryCount]) -> Vec<CategoryPoolRow> {
    counts
        .iter()
        .map(|count| CategoryPoolRow {
            category: count.category,
            pool_id: count.pool_id,
            count: count.count,
        })
        .collect()
}

pub fn pool_performance_rows(
    directory: &PoolDirectory,
    summaries: &[PoolPerformanceSummary],
) -> Vec<PoolPerformanceRow> {
    summaries
        .iter()
        .filter_map(|summary| {
            let pool_name = directory.resolve(summary.pool_id, "pool performance")?;
            Some(PoolPerformanceRow {
                pool_name: pool_name.to_string(),
                average_score: summary.overall.average.map(round1),
                failed: summary.overall.failed,
                not_completed: summary.overall.not_completed,
            })
        })
        .collect()
}

/// One table per sub-category seen in any pool. Pools where the
/// sub-category is absent or averages zero are left out; tables that end up
/// empty are omitted.
pub fn sub_category_tables(
    directory: &PoolDirectory,
    summaries: &[PoolPerformanceSummary],
) -> Vec<SubCategoryTable> {
    let names: BTreeSet<&String> = summaries
        .iter()
        .flat_map(|summary| summary.sub_categories.keys())
        .collect();

    let mut by_name: BTreeMap<&String, Vec<SubCategoryRow>> = BTreeMap::new();
    for summary in summaries {
        let Some(pool_name) = directory.resolve(summary.pool_id, "sub-category performance") else {
            continue;
        };
        for name in &names {
            let Some(average) = summary
                .sub_categories
                .get(*name)
                .and_then(|sub| sub.average)
                .filter(|average| *average > 0.0)
            else {
                continue;
            };
            by_name.entry(*name).or_default().push(SubCategoryRow {
                pool_name: pool_name.to_string(),
                average_score: round1(average),
            });
        }
    }

    by_name
        .into_iter()
        .map(|(name, rows)| SubCategoryTable {
            sub_category: name.clone(),
            title: format!("Average {} Score by Interview Pool", title_case(name)),
            rows,
        })
        .collect()
}

pub fn branch_count_rows(counts: &[CategoryCount]) -> Vec<BranchCountRow> {
    let mut merged: BTreeMap<Category, usize> = BTreeMap::new();
    for count in counts {
        *merged.entry(count.category).or_insert(0) += count.count;
    }
    merged
        .into_iter()
        .map(|(category, count)| BranchCountRow { category, count })
        .collect()
}

pub fn branch_performance_rows(branches: &[BranchPerformance]) -> Vec<BranchPerformanceRow> {
    branches
        .iter()
        .map(|branch| BranchPerformanceRow {
            category: branch.category,
            average_score: branch.summary.average.map(round1),
            failed: branch.summary.failed,
            not_completed: branch.summary.not_completed,
        })
        .collect()
}

/// Wide-to-long: one row per (category, metric), all failed rows first.
pub fn melt_branch_metrics(rows: &[BranchPerformanceRow]) -> Vec<MetricRow> {
    let failed = rows.iter().map(|row| MetricRow {
        category: row.category,
        metric: METRIC_FAILED,
        value: row.failed,
    });
    let not_completed = rows.iter().map(|row| MetricRow {
        category: row.category,
        metric: METRIC_NOT_COMPLETED,
        value: row.not_completed,
    });
    failed.chain(not_completed).collect()
}

pub fn session_score_rows<'a, I>(sessions: I) -> Vec<SessionScoreRow>
where
    I: IntoIterator<Item = &'a InterviewSession>,
{
    sessions
        .into_iter()
        .enumerate()
        .map(|(index, session)| SessionScoreRow {
            index,
            session_id: session.id,
            performance: session.performance,
        })
        .collect()
}

/// Capitalizes the first letter of every alphabetic run, lowercasing the rest.
pub fn title_case(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                output.extend(ch.to_lowercase());
            } else {
                output.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            output.push(ch);
            previous_alpha = false;
        }
    }
    output
}
