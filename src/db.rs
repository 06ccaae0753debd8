use std::time::Instant;

use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::DataAccessError;
use crate::models::{Candidate, InterviewPool, InterviewSession, PoolId, MIN_POOL_CANDIDATES};
use crate::source::{normalize_details, DataSource};

/// Postgres-backed source reading the interview platform's tables.
#[derive(Clone)]
pub struct PgSource {
    pool: PgPool,
    org_id: i64,
    email_domain: String,
}

impl PgSource {
    pub async fn connect(
        database_url: &str,
        org_id: i64,
        email_domain: impl Into<String>,
    ) -> Result<Self, DataAccessError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(DataAccessError::Connect)?;

        Ok(Self {
            pool,
            org_id,
            email_domain: email_domain.into(),
        })
    }
}

fn query_failed(what: &'static str) -> impl FnOnce(sqlx::Error) -> DataAccessError {
    move |source| DataAccessError::Query { what, source }
}

fn pool_from_row(row: &PgRow) -> Result<InterviewPool, sqlx::Error> {
    Ok(InterviewPool {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        invitation: row.try_get("invitation")?,
        created_on: row.try_get("created_on")?,
        num_candidates: row.try_get("num_candidates")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
    })
}

fn session_from_row(row: &PgRow) -> Result<InterviewSession, sqlx::Error> {
    let id: i64 = row.try_get("id")?;
    let details: Option<Value> = row.try_get("details")?;
    Ok(InterviewSession {
        id,
        pool_id: row.try_get("pool_id")?,
        performance: row.try_get("performance")?,
        is_completed: row.try_get::<Option<bool>, _>("is_completed")?.unwrap_or(false),
        details: normalize_details(id, details.unwrap_or(Value::Null)),
    })
}

fn candidate_from_row(row: &PgRow) -> Result<Candidate, sqlx::Error> {
    Ok(Candidate {
        id: row.try_get("id")?,
        name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
        email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
        invited: row.try_get::<Option<bool>, _>("invited")?.unwrap_or(false),
        pool_id: row.try_get("pool_id")?,
        session_id: row.try_get("session_id")?,
        selected: row.try_get::<Option<bool>, _>("selected")?.unwrap_or(false),
    })
}

impl DataSource for PgSource {
    async fn fetch_active_pool_ids(&self, year: i32) -> Result<Vec<PoolId>, DataAccessError> {
        let started = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT s.pool_id::bigint AS pool_id
            FROM interviews_interviewsession s
            JOIN interviews_interview i ON i.id = s.interview_id
            WHERE i.org_id = $1
              AND EXTRACT(YEAR FROM i.timestamp) = $2
              AND s.pool_id IS NOT NULL
            ORDER BY pool_id
            "#,
        )
        .bind(self.org_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("active pool ids"))?;

        let pool_ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("pool_id"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed("active pool ids"))?;

        debug!(
            year,
            pools = pool_ids.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched active pool ids"
        );
        Ok(pool_ids)
    }

    async fn fetch_pool_metadata(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewPool>, DataAccessError> {
        if pool_ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT id::bigint AS id,
                   name,
                   invitation::text AS invitation,
                   created_on::timestamptz AS created_on,
                   num_candidates::bigint AS num_candidates,
                   start_time::timestamptz AS start_time,
                   end_time::timestamptz AS end_time
            FROM interviews_assignmentpool
            WHERE id = ANY($1) AND num_candidates > $2
            ORDER BY id
            "#,
        )
        .bind(pool_ids)
        .bind(MIN_POOL_CANDIDATES)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("pool metadata"))?;

        let pools = rows
            .iter()
            .map(pool_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed("pool metadata"))?;

        debug!(
            pools = pools.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched pool metadata"
        );
        Ok(pools)
    }

    async fn fetch_sessions(
        &self,
        pool_ids: &[PoolId],
    ) -> Result<Vec<InterviewSession>, DataAccessError> {
        if pool_ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT id::bigint AS id,
                   pool_id::bigint AS pool_id,
                   performance::float8 AS performance,
                   is_completed,
                   details::jsonb AS details
            FROM interviews_interviewsession
            WHERE pool_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(pool_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("interview sessions"))?;

        let sessions = rows
            .iter()
            .map(session_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed("interview sessions"))?;

        debug!(
            sessions = sessions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched interview sessions"
        );
        Ok(sessions)
    }

    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, DataAccessError> {
        let started = Instant::now();
        let rows = sqlx::query(
            r#"
            SELECT id::bigint AS id,
                   name,
                   email,
                   invited,
                   pool_id::bigint AS pool_id,
                   session_id::bigint AS session_id,
                   selected
            FROM interviews_candidate
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("candidates"))?;

        let candidates = rows
            .iter()
            .map(candidate_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed("candidates"))?;

        debug!(
            candidates = candidates.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetched candidates"
        );
        Ok(candidates)
    }

    async fn fetch_batch_emails(&self) -> Result<Vec<String>, DataAccessError> {
        let rows = sqlx::query("SELECT email FROM users_user WHERE email LIKE $1")
            .bind(format!("%@{}", self.email_domain))
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("user emails"))?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("email"))
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_failed("user emails"))
    }
}
