// SPDX-FileCopyrightText: 2026 Ambia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generation queue: dedup-aware enqueue, claim-by-CAS and the retry state machine.
//!
//! Every transition is one statement guarded by the expected current status,
//! so concurrent workers on separate connections never double-claim or
//! double-complete a job.

use ambia_core::{AmbiaError, MAX_ERROR_MESSAGE_LEN, truncate_message};
use ambia_core::types::{EnqueueOutcome, FailOutcome, Job, JobStatus, NewJob, QueueStats};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{JOB_COLUMNS, job_from_row, to_json, ts};

/// Message recorded when a worker's lease runs out.
pub const LEASE_EXPIRED_MESSAGE: &str = "lease expired";

/// Inserts `job` unless an equivalent live job exists. The existence check and
/// the insert are the same statement.
pub async fn enqueue(
    db: &Database,
    job: &NewJob,
    now: DateTime<Utc>,
    dedup_window: Duration,
) -> Result<EnqueueOutcome, AmbiaError> {
    let id = uuid::Uuid::new_v4().to_string();
    let user_id = job.user_id.clone();
    let job_type = job.job_type.to_string();
    let priority = i64::from(job.priority.min(100));
    let predicted_need = job.predicted_need.clone();
    let source_query = job.source_query.clone();
    let context = to_json(&job.generation_context)?;
    let prompt_template = job.prompt_template.clone();
    let scheduled_for = ts(job.scheduled_for);
    let valid_until = ts(job.valid_until);
    let max_attempts = i64::from(job.max_attempts);
    let now_s = ts(now);
    let window_start = ts(job.scheduled_for - dedup_window);
    let window_end = ts(job.scheduled_for + dedup_window);

    let inserted = {
        let id = id.clone();
        db.connection()
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    "INSERT INTO generation_queue (
                        id, user_id, job_type, priority, predicted_need, source_query,
                        generation_context, prompt_template, scheduled_for, valid_until,
                        status, attempts, max_attempts, created_at)
                     SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'queued', 0, ?11, ?12
                     WHERE NOT EXISTS (
                        SELECT 1 FROM generation_queue
                        WHERE user_id = ?2
                          AND predicted_need = ?5
                          AND status IN ('queued', 'processing')
                          AND valid_until > ?12
                          AND scheduled_for BETWEEN ?13 AND ?14)",
                    params![
                        id,
                        user_id,
                        job_type,
                        priority,
                        predicted_need,
                        source_query,
                        context,
                        prompt_template,
                        scheduled_for,
                        valid_until,
                        max_attempts,
                        now_s,
                        window_start,
                        window_end,
                    ],
                )
            })
            .await
            .map_err(map_tr_err)?
    };

    Ok(if inserted == 1 {
        EnqueueOutcome::Queued(id)
    } else {
        EnqueueOutcome::Duplicate
    })
}

/// Claims the highest-priority, earliest-scheduled eligible job.
///
/// Eligible: `queued`, `scheduled_for <= now`, `valid_until > now`,
/// `attempts < max_attempts`. Returns `None` when nothing is eligible or when
/// another connection claimed the selected row first.
pub async fn claim(
    db: &Database,
    worker_id: &str,
    now: DateTime<Utc>,
    lease: Duration,
) -> Result<Option<Job>, AmbiaError> {
    let worker_id = worker_id.to_string();
    let now_s = ts(now);
    let locked_until = ts(now + lease);
    let sql = format!(
        "UPDATE generation_queue
         SET status = 'processing', started_at = ?1, claimed_by = ?2, locked_until = ?3
         WHERE id = (
            SELECT id FROM generation_queue
            WHERE status = 'queued'
              AND scheduled_for <= ?1
              AND valid_until > ?1
              AND attempts < max_attempts
            ORDER BY priority DESC, scheduled_for ASC, created_at ASC
            LIMIT 1)
           AND status = 'queued'
         RETURNING {JOB_COLUMNS}"
    );

    db.connection()
        .call(move |conn| -> Result<Option<Job>, rusqlite::Error> {
            conn.query_row(&sql, params![now_s, worker_id, locked_until], job_from_row)
                .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// `processing -> completed`, only while `worker_id` still holds the claim.
pub async fn complete(
    db: &Database,
    job_id: &str,
    worker_id: &str,
    cache_key: &str,
    now: DateTime<Utc>,
) -> Result<bool, AmbiaError> {
    let job_id = job_id.to_string();
    let worker_id = worker_id.to_string();
    let cache_key = cache_key.to_string();
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue
                 SET status = 'completed', result_cache_key = ?2, completed_at = ?3,
                     locked_until = NULL
                 WHERE id = ?1 AND status = 'processing' AND claimed_by = ?4",
                params![job_id, cache_key, now_s, worker_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Records a failed attempt on a processing job.
///
/// `attempts` grows by one; below the cap the job returns to `queued` with its
/// lease cleared, at the cap it becomes `failed`. A worker whose claim was
/// released and taken by another worker gets `None`.
pub async fn fail(
    db: &Database,
    job_id: &str,
    worker_id: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<Option<FailOutcome>, AmbiaError> {
    let job_id = job_id.to_string();
    let worker_id = worker_id.to_string();
    let error_message = truncate_message(error_message, MAX_ERROR_MESSAGE_LEN);
    let now_s = ts(now);
    let outcome = db
        .connection()
        .call(move |conn| -> Result<Option<(String, u32)>, rusqlite::Error> {
            conn.query_row(
                "UPDATE generation_queue
                 SET attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 < max_attempts
                                   THEN 'queued' ELSE 'failed' END,
                     completed_at = CASE WHEN attempts + 1 < max_attempts
                                         THEN NULL ELSE ?3 END,
                     error_message = ?2,
                     claimed_by = NULL,
                     locked_until = NULL
                 WHERE id = ?1 AND status = 'processing' AND claimed_by = ?4
                 RETURNING status, attempts",
                params![job_id, error_message, now_s, worker_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    Ok(outcome.map(|(status, attempts)| {
        if status == JobStatus::Queued.to_string() {
            FailOutcome::Requeued { attempts }
        } else {
            FailOutcome::Failed { attempts }
        }
    }))
}

/// Records a failed attempt and fails the job regardless of remaining attempts.
pub async fn fail_permanently(
    db: &Database,
    job_id: &str,
    worker_id: &str,
    error_message: &str,
    now: DateTime<Utc>,
) -> Result<bool, AmbiaError> {
    let job_id = job_id.to_string();
    let worker_id = worker_id.to_string();
    let error_message = truncate_message(error_message, MAX_ERROR_MESSAGE_LEN);
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue
                 SET attempts = MIN(attempts + 1, max_attempts),
                     status = 'failed',
                     completed_at = ?3,
                     error_message = ?2,
                     claimed_by = NULL,
                     locked_until = NULL
                 WHERE id = ?1 AND status = 'processing' AND claimed_by = ?4",
                params![job_id, error_message, now_s, worker_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// `queued -> cancelled`.
pub async fn cancel(db: &Database, job_id: &str, now: DateTime<Utc>) -> Result<bool, AmbiaError> {
    let job_id = job_id.to_string();
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue SET status = 'cancelled', completed_at = ?2
                 WHERE id = ?1 AND status = 'queued'",
                params![job_id, now_s],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Cancels queued jobs whose validity window closed at or before `now`.
pub async fn expire_queued(db: &Database, now: DateTime<Utc>) -> Result<u64, AmbiaError> {
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue
                 SET status = 'cancelled', completed_at = ?1, error_message = 'expired before generation'
                 WHERE status = 'queued' AND valid_until <= ?1",
                params![now_s],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}

/// Applies the failure rule to processing jobs whose lease ran out before `now`.
pub async fn release_expired_leases(db: &Database, now: DateTime<Utc>) -> Result<u64, AmbiaError> {
    let now_s = ts(now);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE generation_queue
                 SET attempts = attempts + 1,
                     status = CASE WHEN attempts + 1 < max_attempts
                                   THEN 'queued' ELSE 'failed' END,
                     completed_at = CASE WHEN attempts + 1 < max_attempts
                                         THEN NULL ELSE ?1 END,
                     error_message = ?2,
                     claimed_by = NULL,
                     locked_until = NULL
                 WHERE status = 'processing' AND locked_until < ?1",
                params![now_s, LEASE_EXPIRED_MESSAGE],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed as u64)
}

pub async fn get(db: &Database, job_id: &str) -> Result<Option<Job>, AmbiaError> {
    let job_id = job_id.to_string();
    let sql = format!("SELECT {JOB_COLUMNS} FROM generation_queue WHERE id = ?1");
    db.connection()
        .call(move |conn| -> Result<Option<Job>, rusqlite::Error> {
            conn.query_row(&sql, params![job_id], job_from_row).optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Job counts per status.
pub async fn stats(db: &Database) -> Result<QueueStats, AmbiaError> {
    let rows = db
        .connection()
        .call(|conn| -> Result<Vec<(String, i64)>, rusqlite::Error> {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM generation_queue GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    let mut stats = QueueStats::default();
    for (status, count) in rows {
        let status: JobStatus = status
            .parse()
            .map_err(|e: strum::ParseError| AmbiaError::storage(e))?;
        stats.add(status, u64::try_from(count).unwrap_or(0));
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambia_core::types::JobType;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("queue.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn new_job(user: &str, need: &str, scheduled_for: DateTime<Utc>, priority: u8) -> NewJob {
        NewJob {
            user_id: user.to_string(),
            job_type: JobType::Prediction,
            priority,
            predicted_need: need.to_string(),
            source_query: need.replace('_', " "),
            generation_context: serde_json::json!({"pattern": need}),
            prompt_template: None,
            scheduled_for,
            valid_until: scheduled_for.max(t0()) + Duration::hours(1),
            max_attempts: 3,
        }
    }

    async fn enqueue_ok(db: &Database, job: &NewJob) -> String {
        match enqueue(db, job, t0(), Duration::minutes(30)).await.unwrap() {
            EnqueueOutcome::Queued(id) => id,
            EnqueueOutcome::Duplicate => panic!("unexpected duplicate"),
        }
    }

    fn lease() -> Duration {
        Duration::minutes(5)
    }

    #[tokio::test]
    async fn enqueue_claim_complete_lifecycle() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "morning_briefing", t0(), 80)).await;

        let job = claim(&db, "worker-a", t0(), lease()).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.claimed_by.as_deref(), Some("worker-a"));
        assert_eq!(job.started_at, Some(t0()));
        assert_eq!(job.locked_until, Some(t0() + lease()));
        assert_eq!(job.generation_context["pattern"], "morning_briefing");

        assert!(claim(&db, "worker-b", t0(), lease()).await.unwrap().is_none());

        assert!(complete(&db, &id, "worker-a", "abcd1234abcd1234", t0()).await.unwrap());
        let done = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.result_cache_key.as_deref(), Some("abcd1234abcd1234"));
        assert_eq!(done.completed_at, Some(t0()));

        // Terminal: a second completion is rejected.
        assert!(!complete(&db, &id, "worker-a", "other", t0()).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_within_window_is_skipped() {
        let (db, _dir) = setup_db().await;
        let job = new_job("u1", "morning_briefing", t0(), 80);
        enqueue_ok(&db, &job).await;

        let outcome = enqueue(&db, &job, t0(), Duration::minutes(30)).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Duplicate);

        let shifted = new_job("u1", "morning_briefing", t0() + Duration::minutes(20), 80);
        let outcome = enqueue(&db, &shifted, t0(), Duration::minutes(30)).await.unwrap();
        assert_eq!(outcome, EnqueueOutcome::Duplicate);

        // Outside the window, other needs and other users are all distinct.
        let later = new_job("u1", "morning_briefing", t0() + Duration::minutes(45), 80);
        enqueue_ok(&db, &later).await;
        enqueue_ok(&db, &new_job("u1", "evening_movies", t0(), 80)).await;
        enqueue_ok(&db, &new_job("u2", "morning_briefing", t0(), 80)).await;

        assert_eq!(stats(&db).await.unwrap().queued, 4);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn finished_jobs_do_not_block_new_ones() {
        let (db, _dir) = setup_db().await;
        let job = new_job("u1", "morning_briefing", t0(), 80);
        let id = enqueue_ok(&db, &job).await;
        claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
        complete(&db, &id, "w", "k", t0()).await.unwrap();

        enqueue_ok(&db, &job).await;
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn claims_by_priority_then_schedule() {
        let (db, _dir) = setup_db().await;
        let early_low = enqueue_ok(&db, &new_job("u1", "a", t0() - Duration::hours(2), 70)).await;
        let late_high = enqueue_ok(&db, &new_job("u1", "b", t0() - Duration::minutes(5), 95)).await;
        let early_high = enqueue_ok(&db, &new_job("u2", "c", t0() - Duration::hours(1), 95)).await;
        // Not yet due.
        enqueue_ok(&db, &new_job("u3", "d", t0() + Duration::hours(1), 100)).await;

        let order: Vec<String> = {
            let mut ids = Vec::new();
            while let Some(job) = claim(&db, "w", t0(), lease()).await.unwrap() {
                ids.push(job.id);
            }
            ids
        };
        assert_eq!(order, vec![early_high, late_high, early_low]);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_jobs_are_never_claimed() {
        let (db, _dir) = setup_db().await;
        let mut job = new_job("u1", "stale", t0() - Duration::hours(3), 90);
        job.valid_until = t0() - Duration::hours(2);
        enqueue_ok(&db, &job).await;
        assert!(claim(&db, "w", t0(), lease()).await.unwrap().is_none());

        assert_eq!(expire_queued(&db, t0()).await.unwrap(), 1);
        assert_eq!(stats(&db).await.unwrap().cancelled, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_requeues_until_the_cap() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "morning_briefing", t0(), 80)).await;

        for expected in 1..3 {
            claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
            let outcome = fail(&db, &id, "w", "timeout", t0()).await.unwrap();
            assert_eq!(outcome, Some(FailOutcome::Requeued { attempts: expected }));
            let job = get(&db, &id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Queued);
            assert!(job.locked_until.is_none());
            assert!(job.claimed_by.is_none());
        }

        claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
        let outcome = fail(&db, &id, "w", "timeout", t0()).await.unwrap();
        assert_eq!(outcome, Some(FailOutcome::Failed { attempts: 3 }));

        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, job.max_attempts);
        assert_eq!(job.completed_at, Some(t0()));
        assert!(claim(&db, "w", t0(), lease()).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fail_only_applies_to_processing_jobs() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "x", t0(), 80)).await;
        assert_eq!(fail(&db, &id, "w", "nope", t0()).await.unwrap(), None);
        assert!(!fail_permanently(&db, &id, "w", "nope", t0()).await.unwrap());
        assert_eq!(get(&db, &id).await.unwrap().unwrap().attempts, 0);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn error_messages_are_truncated() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "x", t0(), 80)).await;
        claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
        fail(&db, &id, "w", &"e".repeat(2000), t0()).await.unwrap();
        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.error_message.unwrap().len(), MAX_ERROR_MESSAGE_LEN);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn permanent_failure_skips_retries() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "x", t0(), 80)).await;
        claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
        assert!(fail_permanently(&db, &id, "w", "user deleted", t0()).await.unwrap());
        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_only_from_queued() {
        let (db, _dir) = setup_db().await;
        let queued = enqueue_ok(&db, &new_job("u1", "a", t0(), 80)).await;
        assert!(cancel(&db, &queued, t0()).await.unwrap());
        assert!(!cancel(&db, &queued, t0()).await.unwrap());

        let claimed = enqueue_ok(&db, &new_job("u1", "b", t0(), 80)).await;
        claim(&db, "w", t0(), lease()).await.unwrap().unwrap();
        assert!(!cancel(&db, &claimed, t0()).await.unwrap());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn expired_leases_count_as_failed_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "a", t0(), 80)).await;
        claim(&db, "dead-worker", t0(), lease()).await.unwrap().unwrap();

        assert_eq!(release_expired_leases(&db, t0() + Duration::minutes(1)).await.unwrap(), 0);
        assert_eq!(release_expired_leases(&db, t0() + Duration::minutes(6)).await.unwrap(), 1);

        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.error_message.as_deref(), Some(LEASE_EXPIRED_MESSAGE));

        let reclaimed = claim(&db, "worker-b", t0() + Duration::minutes(6), lease())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.id, id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_worker_cannot_touch_a_reclaimed_job() {
        let (db, _dir) = setup_db().await;
        let id = enqueue_ok(&db, &new_job("u1", "a", t0(), 80)).await;
        claim(&db, "worker-a", t0(), lease()).await.unwrap().unwrap();

        let later = t0() + Duration::minutes(6);
        assert_eq!(release_expired_leases(&db, later).await.unwrap(), 1);
        claim(&db, "worker-b", later, lease()).await.unwrap().unwrap();

        // worker-a finishes late, after losing its lease.
        assert_eq!(fail(&db, &id, "worker-a", "late failure", later).await.unwrap(), None);
        assert!(!fail_permanently(&db, &id, "worker-a", "late", later).await.unwrap());
        assert!(!complete(&db, &id, "worker-a", "k", later).await.unwrap());

        let job = get(&db, &id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.claimed_by.as_deref(), Some("worker-b"));
        assert_eq!(job.attempts, 1);
        assert!(claim(&db, "worker-c", later, lease()).await.unwrap().is_none());

        assert!(complete(&db, &id, "worker-b", "k", later).await.unwrap());
        assert_eq!(get(&db, &id).await.unwrap().unwrap().status, JobStatus::Completed);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_claims_across_connections_hand_out_one_job() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("race.db");
        let path = path.to_str().unwrap().to_string();
        let seed = Database::open(&path).await.unwrap();
        enqueue_ok(&seed, &new_job("u1", "only", t0(), 80)).await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                let db = Database::open(&path).await.unwrap();
                let claimed = claim(&db, &format!("worker-{i}"), t0(), Duration::minutes(5))
                    .await
                    .unwrap();
                db.close().await.unwrap();
                claimed
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        seed.close().await.unwrap();
    }
}
