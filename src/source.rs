use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::DataAccessError;
use crate::models::{Candidate, InterviewPool, InterviewSession, PoolId, MIN_POOL_CANDIDATES};

/// Read-only access to the interview store.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    /// Pools with at least one session in an interview held during `year`.
    async fn fetch_active_pool_ids(&self, year: i32) -> Result<Vec<PoolId>, DataAccessError>;

    /// Metadata for the given pools, limited to pools with more than
    /// `MIN_POOL_CANDIDATES` candidates, ordered by id.
    async fn fetch_pool_metadata(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewPool>, DataAccessError>;

    async fn fetch_sessions(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewSession>, DataAccessError>;

    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, DataAccessError>;

    /// Institutional emails of every registered user.
    async fn fetch_batch_emails(&self) -> Result<Vec<String>, DataAccessError>;
}

/// Reduces a stored detail blob to `sub-category -> score`. Blobs stored as a
/// JSON-encoded string are decoded first; entries without a numeric `score`
/// are dropped.
pub fn normalize_details(session_id: i64, raw: Value) -> BTreeMap<String, f64> {
    let value = match raw {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(session_id, error = %err, "session details are not valid JSON");
                return BTreeMap::new();
            }
        },
        other => other,
    };

    match value {
        Value::Object(entries) => entries
            .into_iter()
            .filter_map(|(name, entry)| {
                let score = entry.as_object()?.get("score")?.as_f64()?;
                Some((name, score))
            })
            .collect(),
        Value::Null => BTreeMap::new(),
        _ => {
            warn!(session_id, "session details are not an object");
            BTreeMap::new()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewRecord {
    pub id: i64,
    pub org_id: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecord {
    pub id: i64,
    pub pool_id: Option<PoolId>,
    pub interview_id: Option<i64>,
    pub performance: Option<f64>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    pub email: String,
}

/// Raw table contents, as exported from the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub interviews: Vec<InterviewRecord>,
    #[serde(default)]
    pub pools: Vec<InterviewPool>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

/// In-memory source that answers the same queries as the Postgres source.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
    org_id: i64,
    email_domain: String,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot, org_id: i64, email_domain: impl Into<String>) -> Self {
        Self {
            snapshot,
            org_id,
            email_domain: email_domain.into(),
        }
    }

    pub fn from_path(
        path: &Path,
        org_id: i64,
        email_domain: impl Into<String>,
    ) -> Result<Self, DataAccessError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| DataAccessError::SnapshotIo {
            path: display.clone(),
            source,
        })?;
        let snapshot = serde_json::from_str(&raw).map_err(|source| {
            DataAccessError::SnapshotFormat {
                path: display,
                source,
            }
        })?;
        Ok(Self::new(snapshot, org_id, email_domain))
    }
}

impl DataSource for SnapshotSource {
    async fn fetch_active_pool_ids(&self, year: i32) -> Result<Vec<PoolId>, DataAccessError> {
        let interview_ids: BTreeSet<i64> = self
            .snapshot
            .interviews
            .iter()
            .filter(|interview| {
                interview.org_id == self.org_id && interview.timestamp.year() == year
            })
            .map(|interview| interview.id)
            .collect();

        let pool_ids: BTreeSet<PoolId> = self
            .snapshot
            .sessions
            .iter()
            .filter(|session| {
                session
                    .interview_id
                    .is_some_and(|id| interview_ids.contains(&id))
            })
            .filter_map(|session| session.pool_id)
            .collect();

        Ok(pool_ids.into_iter().collect())
    }

    async fn fetch_pool_metadata(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewPool>, DataAccessError> {
        let mut pools: Vec<InterviewPool> = self
            .snapshot
            .pools
            .iter()
            .filter(|pool| {
                pool_ids.contains(&pool.id) && pool.num_candidates > MIN_POOL_CANDIDATES
            })
            .cloned()
            .collect();
        pools.sort_by_key(|pool| pool.id);
        Ok(pools)
    }

    async fn fetch_sessions(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewSession>, DataAccessError> {
        Ok(self
            .snapshot
            .sessions
            .iter()
            .filter_map(|record| {
                let pool_id = record.pool_id.filter(|id| pool_ids.contains(id))?;
                Some(InterviewSession {
                    id: record.id,
                    pool_id,
                    performance: record.performance,
                    is_completed: record.is_completed,
                    details: normalize_details(record.id, record.details.clone()),
                })
            })
            .collect())
    }

    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, DataAccessError> {
        Ok(self.snapshot.candidates.clone())
    }

    async fn fetch_batch_emails(&self) -> Result<Vec<String>, DataAccessError> {
        let suffix = format!("@{}", self.email_domain);
        Ok(self
            .snapshot
            .users
            .iter()
            .filter(|user| user.email.ends_with(&suffix))
            .map(|user| user.email.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn pool(id: PoolId, num_candidates: i64) -> InterviewPool {
        InterviewPool {
            id,
            name: format!("Pool {id}"),
            invitation: None,
            created_on: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
            num_candidates,
            start_time: None,
            end_time: None,
        }
    }

    fn sample() -> SnapshotSource {
        let snapshot = Snapshot {
            interviews: vec![
                InterviewRecord {
                    id: 1,
                    org_id: 1,
                    timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
                },
                InterviewRecord {
                    id: 2,
                    org_id: 1,
                    timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap(),
                },
                InterviewRecord {
                    id: 3,
                    org_id: 2,
                    timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
                },
            ],
            pools: vec![pool(10, 25), pool(11, 9), pool(12, 40)],
            sessions: vec![
                SessionRecord {
                    id: 100,
                    pool_id: Some(12),
                    interview_id: Some(1),
                    performance: Some(80.0),
                    is_completed: true,
                    details: json!({"coding": {"score": 75}}),
                },
                SessionRecord {
                    id: 101,
                    pool_id: Some(10),
                    interview_id: Some(1),
                    performance: Some(50.0),
                    is_completed: false,
                    details: Value::Null,
                },
                SessionRecord {
                    id: 102,
                    pool_id: Some(11),
                    interview_id: Some(2),
                    performance: Some(90.0),
                    is_completed: true,
                    details: Value::Null,
                },
                SessionRecord {
                    id: 103,
                    pool_id: Some(11),
                    interview_id: Some(3),
                    performance: Some(90.0),
                    is_completed: true,
                    details: Value::Null,
                },
            ],
            candidates: Vec::new(),
            users: vec![
                UserRecord {
                    email: "21pa1a0501@vishnu.edu.in".to_string(),
                },
                UserRecord {
                    email: "someone@gmail.com".to_string(),
                },
            ],
        };
        SnapshotSource::new(snapshot, 1, "vishnu.edu.in")
    }

    #[test]
    fn keeps_scored_object_entries() {
        let details = normalize_details(
            1,
            json!({
                "coding": {"score": 82.5, "attempts": 2},
                "aptitude": {"score": 40},
                "notes": "strong",
                "communication": {"rating": 3}
            }),
        );
        assert_eq!(details.len(), 2);
        assert_eq!(details["coding"], 82.5);
        assert_eq!(details["aptitude"], 40.0);
    }

    #[test]
    fn decodes_string_encoded_details() {
        let details = normalize_details(1, json!("{\"coding\": {\"score\": 60}}"));
        assert_eq!(details.get("coding"), Some(&60.0));
        assert!(normalize_details(1, json!("not json")).is_empty());
        assert!(normalize_details(1, json!([1, 2])).is_empty());
    }

    #[tokio::test]
    async fn active_pools_follow_org_and_year() {
        let source = sample();
        assert_eq!(source.fetch_active_pool_ids(2026).await.unwrap(), vec![10, 12]);
        assert_eq!(source.fetch_active_pool_ids(2025).await.unwrap(), vec![11]);
    }

    #[tokio::test]
    async fn metadata_drops_small_pools() {
        let source = sample();
        let pools = source.fetch_pool_metadata(&[12, 11, 10]).await.unwrap();
        let ids: Vec<PoolId> = pools.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![10, 12]);
    }

    #[tokio::test]
    async fn sessions_are_normalized() {
        let source = sample();
        let sessions = source.fetch_sessions(&[12]).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].details.get("coding"), Some(&75.0));
    }

    #[tokio::test]
    async fn batch_emails_match_domain() {
        let source = sample();
        let emails = source.fetch_batch_emails().await.unwrap();
        assert_eq!(emails, vec!["21pa1a0501@vishnu.edu.in".to_string()]);
    }

    #[tokio::test]
    async fn loads_demo_snapshot() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/sample_snapshot.json");
        let source = SnapshotSource::from_path(&path, 1, "vishnu.edu.in").unwrap();
        let pool_ids = source.fetch_active_pool_ids(2026).await.unwrap();
        assert_eq!(pool_ids, vec![11, 12]);
        let sessions = source.fetch_sessions(&pool_ids).await.unwrap();
        assert_eq!(sessions.len(), 5);
        assert_eq!(sessions[3].details.get("communication"), Some(&76.0));
        assert!(sessions[4].details.is_empty());
    }

    #[test]
    fn missing_snapshot_is_an_io_error() {
        let err = SnapshotSource::from_path(Path::new("does/not/exist.json"), 1, "x.edu")
            .unwrap_err();
        assert!(matches!(err, DataAccessError::SnapshotIo { .. }));
    }
}
