//! Database models for Evolve server.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::evolution_logs;

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = evolution_logs)]
/// Evolution log database record.
pub struct EvolutionLogRecord {
    /// Log identifier.
    pub id: String,
    /// Repository the suggestion was made for.
    pub repository_id: String,
    /// Suggestion description.
    pub suggestion_text: String,
    /// Lifecycle status string.
    pub status: String,
    /// Pull request URL once one exists.
    pub pr_url: Option<String>,
    /// JSON-encoded file operations.
    pub diff_content: Option<String>,
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Last update timestamp.
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = evolution_logs)]
/// Insertable evolution log.
pub struct NewEvolutionLogRecord {
    /// Log identifier.
    pub id: String,
    /// Repository the suggestion was made for.
    pub repository_id: String,
    /// Suggestion description.
    pub suggestion_text: String,
    /// Lifecycle status string.
    pub status: String,
    /// JSON-encoded file operations.
    pub diff_content: Option<String>,
    /// Creation timestamp.
    pub created_at: NaiveDateTime,
    /// Last update timestamp.
    pub updated_at: NaiveDateTime,
}
