use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::Session;

/// Listing row: the indexed columns, without the full session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub status: String,
    pub active_role: String,
    pub stack_depth: i64,
    pub evidence_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkpoint store. Every save replaces the whole session (last writer wins).
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, session: &Session) -> Result<(), ServerError> {
        let state = serde_json::to_string(session)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize session: {}", e)))?;
        let id = session.id.clone();
        let status = session.status.as_str().to_string();
        let active_role = session.active_role.clone();
        let stack_depth = session.delegation_stack().len() as i64;
        let evidence_count = session.evidence().len() as i64;
        let created_at = session.created_at.timestamp_millis();
        let updated_at = session.updated_at.timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO consult_sessions (id, status, active_role, stack_depth, evidence_count,
                     state, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                       status = excluded.status,
                       active_role = excluded.active_role,
                       stack_depth = excluded.stack_depth,
                       evidence_count = excluded.evidence_count,
                       state = excluded.state,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        id,
                        status,
                        active_role,
                        stack_depth,
                        evidence_count,
                        state,
                        created_at,
                        updated_at
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<Session>, ServerError> {
        let sid = session_id.to_string();
        let state: Option<String> = self
            .db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT state FROM consult_sessions WHERE id = ?1",
                    rusqlite::params![sid],
                    |row| row.get(0),
                )
                .optional()
            })
            .await?;

        state
            .map(|s| {
                serde_json::from_str(&s).map_err(|e| {
                    ServerError::Internal(format!("Corrupt checkpoint for '{}': {}", session_id, e))
                })
            })
            .transpose()
    }

    /// Most recently updated first.
    pub async fn list(&self, limit: usize) -> Result<Vec<SessionSummary>, ServerError> {
        let limit = limit as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, status, active_role, stack_depth, evidence_count, created_at, updated_at
                     FROM consult_sessions ORDER BY updated_at DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], |row| Ok(row_to_summary(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, session_id: &str) -> Result<bool, ServerError> {
        let sid = session_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "DELETE FROM consult_sessions WHERE id = ?1",
                    rusqlite::params![sid],
                )?;
                Ok(n > 0)
            })
            .await
    }

    /// Delete sessions that are not running and were last touched before
    /// `cutoff`. Returns the number evicted.
    pub async fn evict_idle(&self, cutoff: DateTime<Utc>) -> Result<usize, ServerError> {
        let cutoff_ms = cutoff.timestamp_millis();
        let evicted = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM consult_sessions WHERE status != 'running' AND updated_at < ?1",
                    rusqlite::params![cutoff_ms],
                )
            })
            .await?;
        if evicted > 0 {
            tracing::info!("[SessionStore] Evicted {} idle session(s)", evicted);
        }
        Ok(evicted)
    }
}

use rusqlite::Row;

/// Column order: id(0), status(1), active_role(2), stack_depth(3),
///               evidence_count(4), created_at(5), updated_at(6)
fn row_to_summary(row: &Row<'_>) -> SessionSummary {
    let created_ms: i64 = row.get(5).unwrap_or(0);
    let updated_ms: i64 = row.get(6).unwrap_or(0);
    SessionSummary {
        id: row.get(0).unwrap_or_default(),
        status: row.get(1).unwrap_or_default(),
        active_role: row.get(2).unwrap_or_default(),
        stack_depth: row.get(3).unwrap_or(0),
        evidence_count: row.get(4).unwrap_or(0),
        created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        updated_at: DateTime::from_timestamp_millis(updated_ms).unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionStatus, StreamKey, Turn};

    fn store() -> SessionStore {
        SessionStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let store = store();
        let mut session = Session::new("intake");
        session.append(StreamKey::Intake, Turn::user("I have a rash"));
        session.record_finding("rash on forearm");
        store.save(&session).await.unwrap();

        let loaded = store.get(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_list_reports_columns() {
        let store = store();
        let mut session = Session::new("intake");
        store.save(&session).await.unwrap();

        session.activate("dermatology");
        session.push_caller("dermatology");
        session.activate("radiology");
        session.record_finding("x-ray normal");
        session.touch();
        store.save(&session).await.unwrap();

        let summaries = store.list(10).await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].active_role, "radiology");
        assert_eq!(summaries[0].stack_depth, 1);
        assert_eq!(summaries[0].evidence_count, 1);
        assert_eq!(summaries[0].status, "running");
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        let session = Session::new("intake");
        store.save(&session).await.unwrap();

        assert!(store.delete(&session.id).await.unwrap());
        assert!(!store.delete(&session.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_idle_keeps_running_sessions() {
        let store = store();
        let running = Session::new("intake");
        let mut waiting = Session::new("intake");
        waiting.status = SessionStatus::AwaitingInput {
            role: "intake".into(),
            action_id: "q1".into(),
            question: "Age?".into(),
        };
        store.save(&running).await.unwrap();
        store.save(&waiting).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.evict_idle(cutoff).await.unwrap(), 1);
        assert!(store.get(&running.id).await.unwrap().is_some());
        assert!(store.get(&waiting.id).await.unwrap().is_none());
    }
}
