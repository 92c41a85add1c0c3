//! Append-only log of completed application runs.

use chrono::Utc;
use jobpilot_core::{Error, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub username: String,
    pub platform: String,
    pub job_url: String,
    /// "ok" or "failed".
    pub status: String,
    pub created_at: String,
}

pub struct SubmissionLog {
    conn: Arc<Mutex<Connection>>,
}

impl SubmissionLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("open submission db: {}", e)))?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("open submission db: {}", e)))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS submissions (
                id         TEXT PRIMARY KEY,
                username   TEXT NOT NULL,
                platform   TEXT NOT NULL,
                job_url    TEXT NOT NULL,
                status     TEXT NOT NULL,
                created_at TEXT NOT NULL
            );",
        )
        .map_err(|e| Error::Storage(format!("init submission schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn record(&self, username: &str, platform: &str, job_url: &str, status: &str) -> Result<SubmissionRecord> {
        let record = SubmissionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            platform: platform.to_lowercase(),
            job_url: job_url.to_string(),
            status: status.to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO submissions (id, username, platform, job_url, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.username,
                record.platform,
                record.job_url,
                record.status,
                record.created_at
            ],
        )
        .map_err(|e| Error::Storage(format!("record submission: {}", e)))?;
        Ok(record)
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<SubmissionRecord>> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare(
                "SELECT id, username, platform, job_url, status, created_at
                 FROM submissions ORDER BY created_at DESC LIMIT ?1",
            )
            .map_err(|e| Error::Storage(format!("recent submissions: {}", e)))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SubmissionRecord {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    platform: row.get(2)?,
                    job_url: row.get(3)?,
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| Error::Storage(format!("recent submissions: {}", e)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(format!("recent submissions: {}", e)))?);
        }
        Ok(out)
    }
}

fn poisoned() -> Error {
    Error::Storage("submission log lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_recent() {
        let log = SubmissionLog::open_in_memory().unwrap();
        log.record("alice", "LinkedIn", "https://l.example/jobs/1", "ok").unwrap();
        log.record("alice", "Indeed", "https://i.example/jobs/2", "ok").unwrap();

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().all(|r| r.status == "ok"));
        assert!(recent.iter().any(|r| r.platform == "linkedin"));
    }

    #[test]
    fn test_recent_respects_limit() {
        let log = SubmissionLog::open_in_memory().unwrap();
        for i in 0..5 {
            log.record("bob", "LinkedIn", &format!("https://l.example/{}", i), "ok")
                .unwrap();
        }
        assert_eq!(log.recent(3).unwrap().len(), 3);
    }
}
