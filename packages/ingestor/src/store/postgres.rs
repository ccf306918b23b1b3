//! PostgreSQL-backed `JobStore`: durable storage, the claim protocol
//! (C3), and the retry policy's persistence half (C4).

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::aggregator::AggregateRow;
use crate::domain::event::NewEvent;
use crate::domain::{Job, JobStatus, RawEvent, ResultRow};
use crate::error::StoreError;
use crate::retry::{next_attempt, RetryConfig, RetryDecision};

use super::traits::{ClaimedJob, JobStatusSnapshot, JobStore, SubmitOutcome};

pub struct PostgresJobStore {
    pool: PgPool,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: &str,
        key: &str,
    ) -> Result<Option<Uuid>, StoreError> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM ingestion_jobs
            WHERE tenant_id = $1 AND idempotency_key = $2
            "#,
        )
        .bind(tenant_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn submit(
        &self,
        tenant_id: &str,
        idempotency_key: Option<&str>,
        new_events: Vec<NewEvent>,
    ) -> Result<SubmitOutcome, StoreError> {
        // Step 1 of §4.6: a pre-check short-circuits the common "already
        // submitted" path without opening a transaction at all.
        if let Some(key) = idempotency_key {
            if let Some(existing) = self.find_by_idempotency_key(tenant_id, key).await? {
                return Ok(SubmitOutcome::Duplicate(existing));
            }
        }

        let job = Job::new_submission(tenant_id.to_string(), idempotency_key.map(String::from));

        let mut tx = self.pool.begin().await.map_err(StoreError::classify)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO ingestion_jobs (
                id, tenant_id, idempotency_key, status, attempt,
                created_at, updated_at, available_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(job.id)
        .bind(&job.tenant_id)
        .bind(&job.idempotency_key)
        .bind(job.status)
        .bind(job.attempt)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.available_at)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                // §4.6 step 3: a concurrent submission under the same
                // key won the race. Roll back, re-read, return theirs.
                tx.rollback().await.map_err(StoreError::classify)?;
                if let Some(key) = idempotency_key {
                    if let Some(existing) = self.find_by_idempotency_key(tenant_id, key).await? {
                        return Ok(SubmitOutcome::Duplicate(existing));
                    }
                }
                return Err(StoreError::Conflict {
                    existing_job_id: job.id,
                });
            }
            return Err(StoreError::classify(err));
        }

        for event in &new_events {
            sqlx::query(
                r#"
                INSERT INTO raw_events (job_id, tenant_id, type, timestamp, payload)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(job.id)
            .bind(tenant_id)
            .bind(&event.event_type)
            .bind(event.timestamp)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::classify)?;
        }

        tx.commit().await.map_err(StoreError::classify)?;

        Ok(SubmitOutcome::Created(job.id))
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        stale_lock_timeout: Duration,
    ) -> Result<Option<ClaimedJob>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::classify)?;

        // Step 1 (§4.3): select one eligible job id, FIFO by created_at,
        // taking a row lock and skipping rows already locked elsewhere.
        let stale_seconds = stale_lock_timeout.as_secs() as i64;
        let candidate_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM ingestion_jobs
            WHERE status IN ('pending', 'processing')
              AND (available_at IS NULL OR available_at <= NOW())
              AND (locked_at IS NULL OR locked_at < NOW() - ($1 * INTERVAL '1 second'))
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(stale_seconds)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::classify)?;

        let Some(candidate_id) = candidate_id else {
            tx.commit().await.map_err(StoreError::classify)?;
            return Ok(None);
        };

        // Step 2: load the job (the row lock already protects us; this
        // re-read also captures the status to guard the update below).
        let loaded = sqlx::query_as::<_, Job>(
            r#"SELECT * FROM ingestion_jobs WHERE id = $1"#,
        )
        .bind(candidate_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::classify)?;

        // Step 3: transition in place, guarded by the status we just
        // observed. If a concurrent administrative update raced us
        // despite the lock, the guard fails and we treat this as "no
        // work" rather than retrying the CAS (§4.3 tie-break).
        let now = Utc::now();
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE ingestion_jobs
            SET status = 'processing',
                attempt = attempt + 1,
                locked_at = $1,
                locked_by = $2,
                updated_at = $1
            WHERE id = $3 AND status = $4
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(worker_id)
        .bind(candidate_id)
        .bind(loaded.status)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StoreError::classify)?;

        let Some(updated) = updated else {
            tx.rollback().await.map_err(StoreError::classify)?;
            return Ok(None);
        };

        let events = sqlx::query_as::<_, RawEvent>(
            r#"SELECT * FROM raw_events WHERE job_id = $1 ORDER BY id ASC"#,
        )
        .bind(candidate_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::classify)?;

        tx.commit().await.map_err(StoreError::classify)?;

        Ok(Some(ClaimedJob {
            job: updated,
            events,
        }))
    }

    async fn succeed(&self, job_id: Uuid, rows: &[AggregateRow]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::classify)?;

        sqlx::query(r#"DELETE FROM ingestion_results WHERE job_id = $1"#)
            .bind(job_id)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::classify)?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO ingestion_results (job_id, event_type, count)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(job_id)
            .bind(&row.event_type)
            .bind(row.count as i32)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::classify)?;
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'succeeded',
                processed_at = $1,
                updated_at = $1,
                available_at = NULL,
                locked_at = NULL,
                locked_by = NULL,
                error = NULL
            WHERE id = $2
            "#,
        )
        .bind(now)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::classify)?;

        tx.commit().await.map_err(StoreError::classify)?;
        Ok(())
    }

    async fn fail(
        &self,
        job_id: Uuid,
        attempt: i32,
        error_message: &str,
        retry_config: &RetryConfig,
    ) -> Result<(), StoreError> {
        let now = Utc::now();

        match next_attempt(attempt, retry_config) {
            RetryDecision::Retry { delay_seconds } => {
                let available_at = now + chrono::Duration::seconds(delay_seconds);
                sqlx::query(
                    r#"
                    UPDATE ingestion_jobs
                    SET status = 'pending',
                        error = $1,
                        available_at = $2,
                        locked_at = NULL,
                        locked_by = NULL,
                        updated_at = $3
                    WHERE id = $4
                    "#,
                )
                .bind(error_message)
                .bind(available_at)
                .bind(now)
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::classify)?;
            }
            RetryDecision::Exhausted => {
                sqlx::query(
                    r#"
                    UPDATE ingestion_jobs
                    SET status = 'failed',
                        error = $1,
                        available_at = NULL,
                        locked_at = NULL,
                        locked_by = NULL,
                        updated_at = $2
                    WHERE id = $3
                    "#,
                )
                .bind(error_message)
                .bind(now)
                .bind(job_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::classify)?;
            }
        }

        Ok(())
    }

    async fn get_status(&self, job_id: Uuid) -> Result<Option<JobStatusSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, status, attempt, created_at, updated_at, processed_at, error
            FROM ingestion_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(JobStatusSnapshot {
            id: row.try_get("id").map_err(StoreError::classify)?,
            status: row.try_get::<JobStatus, _>("status").map_err(StoreError::classify)?,
            attempt: row.try_get("attempt").map_err(StoreError::classify)?,
            created_at: row.try_get("created_at").map_err(StoreError::classify)?,
            updated_at: row.try_get("updated_at").map_err(StoreError::classify)?,
            processed_at: row.try_get("processed_at").map_err(StoreError::classify)?,
            error: row.try_get("error").map_err(StoreError::classify)?,
        }))
    }

    async fn get_results(&self, job_id: Uuid) -> Result<Option<Vec<ResultRow>>, StoreError> {
        let exists = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM ingestion_jobs WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        if exists.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query_as::<_, ResultRow>(
            r#"
            SELECT id, job_id, event_type, count
            FROM ingestion_results
            WHERE job_id = $1
            ORDER BY LOWER(event_type) ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::classify)?;

        Ok(Some(rows))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::classify)?;
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}
