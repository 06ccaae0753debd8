use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::aggregate;
use crate::cache::MemoCache;
use crate::classify;
use crate::error::{DataAccessError, PageError};
use crate::models::{
    BatchCount, Candidate, InterviewPool, InterviewSession, PoolId, PoolPerformanceSummary,
};
use crate::present::{self, PoolDirectory};
use crate::source::DataSource;

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
}

impl Table {
    fn from_rows<T: Serialize>(section: &str, rows: &[T]) -> Result<Self, PageError> {
        let rows = rows
            .iter()
            .map(|row| match serde_json::to_value(row) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other);
                    Ok(map)
                }
                Err(source) => Err(PageError::Shape {
                    section: section.to_string(),
                    source,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Ok(Self { columns, rows })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionBody {
    Table(Table),
    NoData { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub heading: String,
    pub body: SectionBody,
}

impl Section {
    /// Empty row sets become an explicit no-data section.
    fn table<T: Serialize>(
        heading: impl Into<String>,
        rows: &[T],
        empty_message: &str,
    ) -> Result<Self, PageError> {
        let heading = heading.into();
        if rows.is_empty() {
            return Ok(Self::no_data(heading, empty_message));
        }
        let table = Table::from_rows(&heading, rows)?;
        Ok(Self {
            heading,
            body: SectionBody::Table(table),
        })
    }

    fn no_data(heading: impl Into<String>, message: impl Into<String>) -> Self {
        let heading = heading.into();
        let message = message.into();
        info!(section = %heading, %message, "no data for section");
        Self {
            heading,
            body: SectionBody::NoData { message },
        }
    }

    #[cfg(test)]
    pub fn is_no_data(&self) -> bool {
        matches!(self.body, SectionBody::NoData { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub title: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Home,
    Interviews,
    Overall,
    TestAnalysis { pool: Option<String> },
}

impl PageKind {
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Interviews => "interviews",
            Self::Overall => "overall",
            Self::TestAnalysis { .. } => "test-analysis",
        }
    }
}

const DASHBOARD_TITLE: &str = "Skill-2030 Dashboard";

/// Page controllers over a data source, memoizing fetched rows and
/// aggregates for the configured staleness window.
pub struct Dashboard<S> {
    source: S,
    year: i32,
    pools: MemoCache<Vec<InterviewPool>>,
    sessions: MemoCache<Vec<InterviewSession>>,
    performance: MemoCache<Vec<PoolPerformanceSummary>>,
    candidates: MemoCache<Vec<Candidate>>,
    batches: MemoCache<Vec<BatchCount>>,
}

impl<S: DataSource> Dashboard<S> {
    pub fn new(source: S, year: i32, max_age: std::time::Duration) -> Self {
        Self {
            source,
            year,
            pools: MemoCache::new("pools", max_age),
            sessions: MemoCache::new("sessions", max_age),
            performance: MemoCache::new("performance", max_age),
            candidates: MemoCache::new("candidates", max_age),
            batches: MemoCache::new("batches", max_age),
        }
    }

    pub async fn render(&mut self, kind: &PageKind) -> Result<Page, PageError> {
        let render_id = Uuid::new_v4();
        let span = tracing::info_span!("render_page", page = kind.slug(), %render_id);
        async {
            let page = match kind {
                PageKind::Home => self.home().await?,
                PageKind::Interviews => self.interviews().await?,
                PageKind::Overall => self.overall().await?,
                PageKind::TestAnalysis { pool } => self.test_analysis(pool.as_deref()).await?,
            };
            info!(sections = page.sections.len(), "page rendered");
            Ok::<Page, PageError>(page)
        }
        .instrument(span)
        .await
    }

    /// Every page once, sharing cached rows between them.
    pub async fn render_all(&mut self, pool: Option<&str>) -> Result<Vec<Page>, PageError> {
        let kinds = [
            PageKind::Home,
            PageKind::Interviews,
            PageKind::Overall,
            PageKind::TestAnalysis {
                pool: pool.map(str::to_string),
            },
        ];
        let mut pages = Vec::with_capacity(kinds.len());
        for kind in &kinds {
            pages.push(self.render(kind).await?);
        }
        tracing::debug!(
            pools = self.pools.len(),
            sessions = self.sessions.len(),
            performance = self.performance.len(),
            "cache entries after full render"
        );
        Ok(pages)
    }

    pub async fn home(&mut self) -> Result<Page, PageError> {
        let counts = self.batch_counts().await?;
        let rows = present::batch_rows(&counts);
        Ok(Page {
            title: format!("{DASHBOARD_TITLE} - Home"),
            sections: vec![Section::table(
                "Student Distribution by Batch",
                &rows,
                "No student data available.",
            )?],
        })
    }

    pub async fn interviews(&mut self) -> Result<Page, PageError> {
        let title = format!("{DASHBOARD_TITLE} - Interviews");
        let pools = self.active_pools().await?;
        if pools.is_empty() {
            return Ok(Page {
                title,
                sections: vec![Section::no_data(
                    "Interview Pools",
                    "No interview data available.",
                )],
            });
        }

        let directory = PoolDirectory::from_pools(&pools);
        let pool_ids: Vec<PoolId> = pools.iter().map(|pool| pool.id).collect();
        let candidates = self.candidates().await?;
        let categorized = classify::categorize(&candidates);
        let counts = aggregate::category_counts(&pool_ids, &categorized);
        let pool_categories = present::pool_category_rows(&directory, &counts);
        let totals = present::pool_totals(&pool_categories);
        let summaries = self.performance_for(&pool_ids).await?;

        let mut sections = vec![
            Section::table(
                "Interview Pools",
                &present::pool_overview_rows(&pools),
                "No interview data available.",
            )?,
            Section::table(
                "Student Distribution by Category for Each Interview Pool",
                &pool_categories,
                "No categorized students in the active pools.",
            )?,
            Section::table(
                "Total Students per Interview Pool",
                &totals,
                "No categorized students in the active pools.",
            )?,
            Section::table(
                "Branch Distribution for Each Assignment Pool",
                &present::category_pool_rows(&counts),
                "No categorized students in the active pools.",
            )?,
        ];

        if summaries.iter().all(|summary| summary.overall.average.is_none()) {
            sections.push(Section::no_data(
                "Performance Metrics",
                "No performance data available.",
            ));
        } else {
            sections.push(Section::table(
                "Performance Metrics",
                &present::pool_performance_rows(&directory, &summaries),
                "No performance data available.",
            )?);
        }

        Ok(Page { title, sections })
    }

    pub async fn overall(&mut self) -> Result<Page, PageError> {
        let title = format!("{DASHBOARD_TITLE} - Categorical Analysis");
        let pools = self.active_pools().await?;
        let pool_ids: Vec<PoolId> = pools.iter().map(|pool| pool.id).collect();
        let summaries = self.performance_for(&pool_ids).await?;
        let directory = PoolDirectory::from_pools(&pools);
        let tables = present::sub_category_tables(&directory, &summaries);

        if tables.is_empty() {
            return Ok(Page {
                title,
                sections: vec![Section::no_data(
                    "Sub-Category Performance Metrics",
                    "No performance data available.",
                )],
            });
        }

        let sections = tables
            .iter()
            .map(|table| Section::table(table.title.clone(), &table.rows, "No scores above zero."))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page { title, sections })
    }

    pub async fn test_analysis(&mut self, pool_name: Option<&str>) -> Result<Page, PageError> {
        let title = format!("{DASHBOARD_TITLE} - Test Analysis");
        let pools = self.active_pools().await?;
        let Some(first) = pools.first() else {
            return Ok(Page {
                title,
                sections: vec![Section::no_data(
                    "Interview Pool",
                    "No interview data available.",
                )],
            });
        };

        let selected = match pool_name {
            Some(name) => pools.iter().find(|pool| pool.name == name),
            None => Some(first),
        };
        let Some(selected) = selected else {
            let available: Vec<&str> = pools.iter().map(|pool| pool.name.as_str()).collect();
            return Ok(Page {
                title,
                sections: vec![Section::no_data(
                    "Interview Pool",
                    format!(
                        "No interview pool named '{}'. Available pools: {}.",
                        pool_name.unwrap_or_default(),
                        available.join(", ")
                    ),
                )],
            });
        };

        let pool_ids: Vec<PoolId> = pools.iter().map(|pool| pool.id).collect();
        let sessions: Vec<InterviewSession> = self
            .sessions_for(&pool_ids)
            .await?
            .into_iter()
            .filter(|session| session.pool_id == selected.id)
            .collect();
        let heading = format!("{DASHBOARD_TITLE} - Test Analysis: {}", selected.name);

        if sessions.is_empty() {
            return Ok(Page {
                title: heading,
                sections: vec![Section::no_data(
                    "Sessions",
                    format!("No Data available for {}.", selected.name),
                )],
            });
        }

        let candidates = self.candidates().await?;
        if candidates.is_empty() {
            return Ok(Page {
                title: heading,
                sections: vec![Section::no_data("Students", "No student data available.")],
            });
        }

        let categorized: Vec<_> = classify::categorize(&candidates)
            .into_iter()
            .filter(|entry| entry.candidate.pool_id == Some(selected.id))
            .collect();
        let branch_counts =
            present::branch_count_rows(&aggregate::category_counts(&[selected.id], &categorized));
        let branch_rows =
            present::branch_performance_rows(&aggregate::branch_performance(&sessions, &categorized));

        let mut sections = vec![
            Section::table(
                format!("Branch-wise student distribution for {}", selected.name),
                &branch_counts,
                "No categorized students in this pool.",
            )?,
            Section::table(
                format!("Scores for {}", selected.name),
                &present::session_score_rows(&sessions),
                "No sessions recorded.",
            )?,
        ];

        if branch_rows.is_empty() {
            sections.push(Section::no_data(
                "Branch-wise Performance",
                "No branch performance data available.",
            ));
        } else {
            sections.push(Section::table(
                format!("Branch-wise Average Performance for {}", selected.name),
                &branch_rows,
                "No branch performance data available.",
            )?);
            sections.push(Section::table(
                format!("Branch-wise Performance Metrics for {}", selected.name),
                &present::melt_branch_metrics(&branch_rows),
                "No branch performance data available.",
            )?);
        }

        Ok(Page {
            title: heading,
            sections,
        })
    }

    async fn active_pools(&mut self) -> Result<Vec<InterviewPool>, DataAccessError> {
        let key = MemoCache::<Vec<InterviewPool>>::key_for(&self.year);
        if let Some(pools) = self.pools.get(key) {
            return Ok(pools);
        }
        let pool_ids = self.source.fetch_active_pool_ids(self.year).await?;
        let pools = self.source.fetch_pool_metadata(&pool_ids).await?;
        self.pools.insert(key, pools.clone());
        Ok(pools)
    }

    async fn sessions_for(
        &mut self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewSession>, DataAccessError> {
        let key = MemoCache::<Vec<InterviewSession>>::key_for(pool_ids);
        if let Some(sessions) = self.sessions.get(key) {
            return Ok(sessions);
        }
        let sessions = self.source.fetch_sessions(pool_ids).await?;
        self.sessions.insert(key, sessions.clone());
        Ok(sessions)
    }

    async fn performance_for(
        &mut self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<PoolPerformanceSummary>, DataAccessError> {
        let key = MemoCache::<Vec<PoolPerformanceSummary>>::key_for(pool_ids);
        if let Some(summaries) = self.performance.get(key) {
            return Ok(summaries);
        }
        let sessions = self.sessions_for(pool_ids).await?;
        let summaries = aggregate::pool_performance(pool_ids, &sessions);
        self.performance.insert(key, summaries.clone());
        Ok(summaries)
    }

    async fn candidates(&mut self) -> Result<Vec<Candidate>, DataAccessError> {
        if let Some(candidates) = self.candidates.get(0) {
            return Ok(candidates);
        }
        let candidates = self.source.fetch_candidates().await?;
        self.candidates.insert(0, candidates.clone());
        Ok(candidates)
    }

    async fn batch_counts(&mut self) -> Result<Vec<BatchCount>, DataAccessError> {
        if let Some(counts) = self.batches.get(0) {
            return Ok(counts);
        }
        let emails = self.source.fetch_batch_emails().await?;
        let counts = aggregate::batch_counts(&emails);
        self.batches.insert(0, counts.clone());
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{InterviewRecord, SessionRecord, Snapshot, SnapshotSource, UserRecord};
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::time::Duration;

    fn pool(id: PoolId, name: &str, num_candidates: i64) -> InterviewPool {
        InterviewPool {
            id,
            name: name.to_string(),
            invitation: None,
            created_on: Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap(),
            num_candidates,
            start_time: None,
            end_time: None,
        }
    }

    fn session(id: i64, pool_id: PoolId, performance: f64, is_completed: bool) -> SessionRecord {
        SessionRecord {
            id,
            pool_id: Some(pool_id),
            interview_id: Some(1),
            performance: Some(performance),
            is_completed,
            details: json!({"coding": {"score": performance}}),
        }
    }

    fn candidate(id: i64, email: &str, pool_id: PoolId, session_id: i64) -> Candidate {
        Candidate {
            id,
            name: format!("Student {id}"),
            email: email.to_string(),
            invited: true,
            pool_id: Some(pool_id),
            session_id: Some(session_id),
            selected: false,
        }
    }

    fn dashboard() -> Dashboard<SnapshotSource> {
        let snapshot = Snapshot {
            interviews: vec![InterviewRecord {
                id: 1,
                org_id: 1,
                timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap(),
            }],
            pools: vec![pool(1, "Java Drive", 20), pool(2, "Python Drive", 15)],
            sessions: vec![
                session(10, 1, 60.0, true),
                session(11, 1, 80.0, false),
                session(12, 1, 90.0, true),
                session(20, 2, 75.0, true),
            ],
            candidates: vec![
                candidate(1, "21pa1a0501@vishnu.edu.in", 1, 10),
                candidate(2, "21pa1a0502@vishnu.edu.in", 1, 11),
                candidate(3, "21pa1a1201@vishnu.edu.in", 1, 12),
                candidate(4, "22pa1a0301@vishnu.edu.in", 2, 20),
            ],
            users: vec![
                UserRecord {
                    email: "21pa1a0501@vishnu.edu.in".to_string(),
                },
                UserRecord {
                    email: "22pa1a0301@vishnu.edu.in".to_string(),
                },
            ],
        };
        Dashboard::new(
            SnapshotSource::new(snapshot, 1, "vishnu.edu.in"),
            2026,
            Duration::from_secs(60),
        )
    }

    fn table<'a>(page: &'a Page, heading: &str) -> &'a Table {
        let section = page
            .sections
            .iter()
            .find(|section| section.heading == heading)
            .unwrap_or_else(|| panic!("missing section {heading}"));
        match &section.body {
            SectionBody::Table(table) => table,
            SectionBody::NoData { message } => panic!("{heading} had no data: {message}"),
        }
    }

    #[tokio::test]
    async fn home_counts_batches() {
        let page = dashboard().home().await.unwrap();
        let batches = table(&page, "Student Distribution by Batch");
        assert_eq!(batches.columns, vec!["batch", "students", "share_pct"]);
        assert_eq!(batches.rows.len(), 2);
        assert_eq!(batches.rows[0]["batch"], json!(2021));
    }

    #[tokio::test]
    async fn interviews_page_joins_pool_names() {
        let page = dashboard().interviews().await.unwrap();
        let categories = table(&page, "Student Distribution by Category for Each Interview Pool");
        assert_eq!(categories.rows.len(), 2);
        assert_eq!(categories.rows[0]["pool_name"], json!("Java Drive"));
        assert_eq!(categories.rows[0]["category"], json!("CSE"));
        assert_eq!(categories.rows[0]["count"], json!(2));

        let totals = table(&page, "Total Students per Interview Pool");
        assert_eq!(totals.rows.len(), 1);
        assert_eq!(totals.rows[0]["total"], json!(3));

        let performance = table(&page, "Performance Metrics");
        assert_eq!(performance.rows[0]["average_score"], json!(76.7));
        assert_eq!(performance.rows[0]["failed"], json!(1));
        assert_eq!(performance.rows[0]["not_completed"], json!(1));
    }

    #[tokio::test]
    async fn overall_page_has_one_table_per_sub_category() {
        let page = dashboard().overall().await.unwrap();
        assert_eq!(page.sections.len(), 1);
        let coding = table(&page, "Average Coding Score by Interview Pool");
        assert_eq!(coding.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_analysis_defaults_to_first_pool() {
        let page = dashboard().test_analysis(None).await.unwrap();
        assert!(page.title.ends_with("Java Drive"));
        let branches = table(&page, "Branch-wise Average Performance for Java Drive");
        assert_eq!(branches.rows.len(), 2);
        let metrics = table(&page, "Branch-wise Performance Metrics for Java Drive");
        assert_eq!(metrics.rows.len(), 4);
    }

    #[tokio::test]
    async fn unknown_pool_is_reported_as_no_data() {
        let page = dashboard().test_analysis(Some("Rust Drive")).await.unwrap();
        assert_eq!(page.sections.len(), 1);
        assert!(page.sections[0].is_no_data());
        let SectionBody::NoData { message } = &page.sections[0].body else {
            unreachable!()
        };
        assert!(message.contains("Java Drive, Python Drive"));
    }

    #[tokio::test]
    async fn pool_without_branch_matches_reports_no_branch_data() {
        let page = dashboard().test_analysis(Some("Python Drive")).await.unwrap();
        let last = page.sections.last().unwrap();
        assert!(last.is_no_data());
        assert!(page.sections[0].is_no_data());
    }

    #[tokio::test]
    async fn empty_store_renders_no_data_everywhere() {
        let mut dashboard = Dashboard::new(
            SnapshotSource::new(Snapshot::default(), 1, "vishnu.edu.in"),
            2026,
            Duration::from_secs(60),
        );
        let pages = dashboard.render_all(None).await.unwrap();
        assert_eq!(pages.len(), 4);
        for page in &pages {
            assert!(page.sections.iter().all(Section::is_no_data), "{}", page.title);
        }
    }

    #[tokio::test]
    async fn rendering_twice_gives_identical_output() {
        let mut dashboard = dashboard();
        let first = serde_json::to_value(dashboard.render_all(None).await.unwrap()).unwrap();
        let second = serde_json::to_value(dashboard.render_all(None).await.unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
