//! Platform session store.
//!
//! Maps (username, lowercased platform) to the serialized browser storage
//! state captured at the end of a run, so the next run for the same pair can
//! skip the login flow. Upserts are last-writer-wins; there is no expiry and
//! at most one row per key.

use chrono::Utc;
use jobpilot_core::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub username: String,
    pub platform: String,
    /// Opaque storage-state blob (cookies + per-origin localStorage).
    pub storage_state: serde_json::Value,
    pub updated_at: String,
}

pub struct PlatformSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl PlatformSessionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("open session db: {}", e)))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS platform_sessions (
                username      TEXT NOT NULL,
                platform      TEXT NOT NULL,
                storage_state TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                PRIMARY KEY (username, platform)
            );",
        )
        .map_err(|e| Error::Storage(format!("init session schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("open session db: {}", e)))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS platform_sessions (
                username      TEXT NOT NULL,
                platform      TEXT NOT NULL,
                storage_state TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                PRIMARY KEY (username, platform)
            );",
        )
        .map_err(|e| Error::Storage(format!("init session schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn key_platform(platform: &str) -> String {
        platform.trim().to_lowercase()
    }

    pub fn load(&self, username: &str, platform: &str) -> Result<Option<SessionRecord>> {
        let platform = Self::key_platform(platform);
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let row = conn
            .query_row(
                "SELECT username, platform, storage_state, updated_at
                 FROM platform_sessions WHERE username = ?1 AND platform = ?2",
                params![username, platform],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| Error::Storage(format!("load session: {}", e)))?;

        match row {
            Some((username, platform, blob, updated_at)) => {
                let storage_state = serde_json::from_str(&blob)?;
                Ok(Some(SessionRecord {
                    username,
                    platform,
                    storage_state,
                    updated_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Upsert the storage state for a (username, platform) pair.
    pub fn save(&self, username: &str, platform: &str, storage_state: &serde_json::Value) -> Result<()> {
        let platform = Self::key_platform(platform);
        let blob = serde_json::to_string(storage_state)?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        conn.execute(
            "INSERT INTO platform_sessions (username, platform, storage_state, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(username, platform) DO UPDATE SET
                 storage_state = excluded.storage_state,
                 updated_at = excluded.updated_at",
            params![username, platform, blob, now],
        )
        .map_err(|e| Error::Storage(format!("save session: {}", e)))?;
        debug!(username = %username, platform = %platform, "Platform session saved");
        Ok(())
    }

    /// All stored sessions, newest first. The blob itself is not returned;
    /// listing is for ops visibility, not replay.
    pub fn list(&self) -> Result<Vec<(String, String, String)>> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let mut stmt = conn
            .prepare(
                "SELECT username, platform, updated_at
                 FROM platform_sessions ORDER BY updated_at DESC",
            )
            .map_err(|e| Error::Storage(format!("list sessions: {}", e)))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| Error::Storage(format!("list sessions: {}", e)))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| Error::Storage(format!("list sessions: {}", e)))?);
        }
        Ok(out)
    }

    /// Remove one stored session. Returns true when a row was deleted.
    pub fn delete(&self, username: &str, platform: &str) -> Result<bool> {
        let platform = Self::key_platform(platform);
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let n = conn
            .execute(
                "DELETE FROM platform_sessions WHERE username = ?1 AND platform = ?2",
                params![username, platform],
            )
            .map_err(|e| Error::Storage(format!("delete session: {}", e)))?;
        Ok(n > 0)
    }

    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| poisoned())?;
        let n = conn
            .execute("DELETE FROM platform_sessions", [])
            .map_err(|e| Error::Storage(format!("clear sessions: {}", e)))?;
        Ok(n)
    }
}

fn poisoned() -> Error {
    Error::Storage("session store lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_and_load() {
        let store = PlatformSessionStore::open_in_memory().unwrap();
        let state = json!({"cookies": [{"name": "li_at", "value": "tok"}], "origins": []});
        store.save("alice@example.com", "LinkedIn", &state).unwrap();

        let record = store.load("alice@example.com", "linkedin").unwrap().unwrap();
        assert_eq!(record.platform, "linkedin");
        assert_eq!(record.storage_state["cookies"][0]["name"], "li_at");
    }

    #[test]
    fn test_upsert_last_writer_wins() {
        let store = PlatformSessionStore::open_in_memory().unwrap();
        store
            .save("alice", "LinkedIn", &json!({"cookies": [], "origins": []}))
            .unwrap();
        store
            .save("alice", "LINKEDIN", &json!({"cookies": [{"name": "v2"}], "origins": []}))
            .unwrap();

        // Platform is lowercased into the key, so both writes hit one row.
        assert_eq!(store.list().unwrap().len(), 1);
        let record = store.load("alice", "linkedin").unwrap().unwrap();
        assert_eq!(record.storage_state["cookies"][0]["name"], "v2");
    }

    #[test]
    fn test_separate_platforms_separate_rows() {
        let store = PlatformSessionStore::open_in_memory().unwrap();
        store.save("alice", "LinkedIn", &json!({})).unwrap();
        store.save("alice", "Indeed", &json!({})).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_delete() {
        let store = PlatformSessionStore::open_in_memory().unwrap();
        store.save("alice", "LinkedIn", &json!({})).unwrap();
        assert!(store.delete("alice", "LinkedIn").unwrap());
        assert!(!store.delete("alice", "LinkedIn").unwrap());
        assert!(store.load("alice", "LinkedIn").unwrap().is_none());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = PlatformSessionStore::open(&path).unwrap();
            store.save("bob", "Glassdoor", &json!({"cookies": []})).unwrap();
        }
        let store = PlatformSessionStore::open(&path).unwrap();
        assert!(store.load("bob", "glassdoor").unwrap().is_some());
    }
}
