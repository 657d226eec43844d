//! Evolution log persistence.
//!
//! Every suggestion handed out by the API is recorded as an evolution log and
//! follows it through the pull request lifecycle. Handlers only see the
//! [`EvolutionLogStore`] trait; [`PgLogStore`] backs production and
//! [`MemoryLogStore`] backs tests and database-less deployments.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::{EvolutionLogRecord, NewEvolutionLogRecord};
use crate::schema::evolution_logs;

/// Lifecycle of a suggestion once it has been handed out.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    /// Suggested, not yet acted on.
    Pending,
    /// A pull request was opened.
    PrCreated,
    /// CI passed on the pull request.
    TestsPassed,
    /// CI failed on the pull request.
    TestsFailed,
    /// The pull request was merged.
    Merged,
    /// The suggestion was turned down.
    Rejected,
}

impl LogStatus {
    /// Stored status label.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Pending => "pending",
            LogStatus::PrCreated => "pr_created",
            LogStatus::TestsPassed => "tests_passed",
            LogStatus::TestsFailed => "tests_failed",
            LogStatus::Merged => "merged",
            LogStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for LogStatus {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(LogStatus::Pending),
            "pr_created" => Ok(LogStatus::PrCreated),
            "tests_passed" => Ok(LogStatus::TestsPassed),
            "tests_failed" => Ok(LogStatus::TestsFailed),
            "merged" => Ok(LogStatus::Merged),
            "rejected" => Ok(LogStatus::Rejected),
            other => Err(StoreError::new(format!("unknown status `{other}`"))),
        }
    }
}

/// A stored evolution log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct EvolutionLog {
    /// Log identifier.
    pub id: String,
    /// Repository the suggestion was made for.
    pub repository_id: String,
    /// Suggestion description.
    pub suggestion_text: String,
    /// Lifecycle status.
    pub status: LogStatus,
    /// Pull request URL once one exists.
    pub pr_url: Option<String>,
    /// JSON-encoded file operations of the suggestion.
    pub diff_content: Option<String>,
    /// Creation timestamp (UTC).
    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,
    /// Last update timestamp (UTC).
    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}

/// Fields supplied when recording a new suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvolutionLog {
    /// Repository the suggestion was made for.
    pub repository_id: String,
    /// Suggestion description.
    pub suggestion_text: String,
    /// JSON-encoded file operations.
    pub diff_content: Option<String>,
}

/// Error type for log persistence.
#[derive(Debug, Clone)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Build an error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

/// Persistence seam for evolution logs.
pub trait EvolutionLogStore: Send + Sync {
    /// Record a new `pending` log.
    fn insert(&self, log: NewEvolutionLog) -> Result<EvolutionLog, StoreError>;
    /// Attach a pull request to a log and move it to `pr_created`.
    fn mark_pr_created(&self, id: &str, pr_url: &str) -> Result<bool, StoreError>;
    /// Set the status of one log; returns whether it existed.
    fn set_status(&self, id: &str, status: LogStatus) -> Result<bool, StoreError>;
    /// Set the status of every log for a pull request; returns the count.
    fn set_status_by_pr_url(&self, pr_url: &str, status: LogStatus) -> Result<usize, StoreError>;
    /// Logs, newest first, optionally for one repository.
    fn list(&self, repository_id: Option<&str>) -> Result<Vec<EvolutionLog>, StoreError>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    logs: RwLock<Vec<EvolutionLog>>,
}

impl MemoryLogStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, mut matches: F, apply: impl Fn(&mut EvolutionLog)) -> Result<usize, StoreError>
    where
        F: FnMut(&EvolutionLog) -> bool,
    {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StoreError::new("log store lock poisoned"))?;
        let now = now();
        let mut updated = 0;
        for log in logs.iter_mut().filter(|log| matches(log)) {
            apply(log);
            log.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }
}

impl EvolutionLogStore for MemoryLogStore {
    fn insert(&self, log: NewEvolutionLog) -> Result<EvolutionLog, StoreError> {
        let now = now();
        let record = EvolutionLog {
            id: Uuid::new_v4().to_string(),
            repository_id: log.repository_id,
            suggestion_text: log.suggestion_text,
            status: LogStatus::Pending,
            pr_url: None,
            diff_content: log.diff_content,
            created_at: now,
            updated_at: now,
        };
        self.logs
            .write()
            .map_err(|_| StoreError::new("log store lock poisoned"))?
            .push(record.clone());
        Ok(record)
    }

    fn mark_pr_created(&self, id: &str, pr_url: &str) -> Result<bool, StoreError> {
        let updated = self.update(
            |log| log.id == id,
            |log| {
                log.status = LogStatus::PrCreated;
                log.pr_url = Some(pr_url.to_string());
            },
        )?;
        Ok(updated > 0)
    }

    fn set_status(&self, id: &str, status: LogStatus) -> Result<bool, StoreError> {
        let updated = self.update(|log| log.id == id, |log| log.status = status)?;
        Ok(updated > 0)
    }

    fn set_status_by_pr_url(&self, pr_url: &str, status: LogStatus) -> Result<usize, StoreError> {
        self.update(
            |log| log.pr_url.as_deref() == Some(pr_url),
            |log| log.status = status,
        )
    }

    fn list(&self, repository_id: Option<&str>) -> Result<Vec<EvolutionLog>, StoreError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StoreError::new("log store lock poisoned"))?;
        // Insertion order breaks timestamp ties, newest last.
        let mut selected: Vec<EvolutionLog> = logs
            .iter()
            .filter(|log| repository_id.is_none_or(|id| log.repository_id == id))
            .cloned()
            .collect();
        selected.reverse();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(selected)
    }
}

/// PostgreSQL store backed by Diesel.
#[derive(Clone)]
pub struct PgLogStore {
    pool: DbPool,
}

impl PgLogStore {
    /// Wrap a migrated connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> Result<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>, StoreError>
    {
        self.pool
            .get()
            .map_err(|err| StoreError::new(format!("db connection failed: {err}")))
    }
}

impl EvolutionLogStore for PgLogStore {
    fn insert(&self, log: NewEvolutionLog) -> Result<EvolutionLog, StoreError> {
        let mut conn = self.conn()?;
        let now = now();
        let record = NewEvolutionLogRecord {
            id: Uuid::new_v4().to_string(),
            repository_id: log.repository_id,
            suggestion_text: log.suggestion_text,
            status: LogStatus::Pending.as_str().to_string(),
            diff_content: log.diff_content,
            created_at: now,
            updated_at: now,
        };
        let stored: EvolutionLogRecord = diesel::insert_into(evolution_logs::table)
            .values(&record)
            .returning(EvolutionLogRecord::as_returning())
            .get_result(&mut conn)
            .map_err(|err| StoreError::new(format!("insert evolution log failed: {err}")))?;
        to_log(stored)
    }

    fn mark_pr_created(&self, id: &str, pr_url: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let updated = diesel::update(evolution_logs::table.find(id))
            .set((
                evolution_logs::status.eq(LogStatus::PrCreated.as_str()),
                evolution_logs::pr_url.eq(Some(pr_url)),
                evolution_logs::updated_at.eq(now()),
            ))
            .execute(&mut conn)
            .map_err(|err| StoreError::new(format!("update evolution log failed: {err}")))?;
        Ok(updated > 0)
    }

    fn set_status(&self, id: &str, status: LogStatus) -> Result<bool, StoreError> {
        let mut conn = self.conn()?;
        let updated = diesel::update(evolution_logs::table.find(id))
            .set((
                evolution_logs::status.eq(status.as_str()),
                evolution_logs::updated_at.eq(now()),
            ))
            .execute(&mut conn)
            .map_err(|err| StoreError::new(format!("update evolution log failed: {err}")))?;
        Ok(updated > 0)
    }

    fn set_status_by_pr_url(&self, pr_url: &str, status: LogStatus) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        diesel::update(evolution_logs::table.filter(evolution_logs::pr_url.eq(pr_url)))
            .set((
                evolution_logs::status.eq(status.as_str()),
                evolution_logs::updated_at.eq(now()),
            ))
            .execute(&mut conn)
            .map_err(|err| StoreError::new(format!("update evolution logs failed: {err}")))
    }

    fn list(&self, repository_id: Option<&str>) -> Result<Vec<EvolutionLog>, StoreError> {
        let mut conn = self.conn()?;
        let mut query = evolution_logs::table
            .select(EvolutionLogRecord::as_select())
            .order(evolution_logs::created_at.desc())
            .into_boxed();
        if let Some(repository_id) = repository_id {
            query = query.filter(evolution_logs::repository_id.eq(repository_id.to_string()));
        }
        let records = query
            .load::<EvolutionLogRecord>(&mut conn)
            .map_err(|err| StoreError::new(format!("load evolution logs failed: {err}")))?;
        records.into_iter().map(to_log).collect()
    }
}

fn to_log(record: EvolutionLogRecord) -> Result<EvolutionLog, StoreError> {
    Ok(EvolutionLog {
        status: record.status.parse()?,
        id: record.id,
        repository_id: record.repository_id,
        suggestion_text: record.suggestion_text,
        pr_url: record.pr_url,
        diff_content: record.diff_content,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TestDatabase;

    fn new_log(repository_id: &str, text: &str) -> NewEvolutionLog {
        NewEvolutionLog {
            repository_id: repository_id.to_string(),
            suggestion_text: text.to_string(),
            diff_content: Some("[]".to_string()),
        }
    }

    fn exercise_store(store: &dyn EvolutionLogStore) {
        let first = store.insert(new_log("42", "first")).expect("insert first");
        let second = store.insert(new_log("42", "second")).expect("insert second");
        store.insert(new_log("7", "other")).expect("insert other");
        assert_eq!(first.status, LogStatus::Pending);

        let logs = store.list(Some("42")).expect("list");
        let texts: Vec<&str> = logs.iter().map(|log| log.suggestion_text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
        assert_eq!(store.list(None).expect("list all").len(), 3);

        assert!(store
            .mark_pr_created(&first.id, "https://github.com/o/r/pull/1")
            .expect("mark"));
        assert!(!store.mark_pr_created("missing", "x").expect("mark missing"));

        let updated = store
            .set_status_by_pr_url("https://github.com/o/r/pull/1", LogStatus::Merged)
            .expect("status by url");
        assert_eq!(updated, 1);
        assert!(store.set_status(&second.id, LogStatus::Rejected).expect("reject"));

        let logs = store.list(Some("42")).expect("list");
        let merged = logs.iter().find(|log| log.id == first.id).expect("first");
        assert_eq!(merged.status, LogStatus::Merged);
        assert_eq!(merged.pr_url.as_deref(), Some("https://github.com/o/r/pull/1"));
        let rejected = logs.iter().find(|log| log.id == second.id).expect("second");
        assert_eq!(rejected.status, LogStatus::Rejected);
    }

    #[test]
    fn status_labels_round_trip() {
        for status in [
            LogStatus::Pending,
            LogStatus::PrCreated,
            LogStatus::TestsPassed,
            LogStatus::TestsFailed,
            LogStatus::Merged,
            LogStatus::Rejected,
        ] {
            assert_eq!(status.as_str().parse::<LogStatus>().expect("parse"), status);
        }
        assert!("shipped".parse::<LogStatus>().is_err());
    }

    #[test]
    fn memory_store_tracks_lifecycle() {
        exercise_store(&MemoryLogStore::new());
    }

    #[test]
    fn pg_store_tracks_lifecycle() {
        let Some(mut test_db) = TestDatabase::from_env() else {
            return;
        };
        let store = PgLogStore::new(test_db.pool());
        exercise_store(&store);
    }
}
