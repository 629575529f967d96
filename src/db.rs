//! Database operations for try-on history

use std::path::Path;

use rusqlite::{params, Connection};

use crate::models::HistoryEntry;
use crate::paths::get_db_path;

/// SQLite mirror of the in-memory history log, so history survives
/// restarts. The log stays authoritative; this store only follows it.
pub struct HistoryStore {
    conn: Connection,
}

impl HistoryStore {
    /// Opens the store at the default database path
    pub fn open_default() -> Result<Self, String> {
        let db_path = get_db_path()?;
        Self::open(&db_path)
    }

    /// Opens the store at the given path, creating the schema if needed
    pub fn open(path: &Path) -> Result<Self, String> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create database directory: {}", e))?;
        }
        let conn =
            Connection::open(path).map_err(|e| format!("Failed to open database: {}", e))?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open database: {}", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, String> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS tryon_history (
                id INTEGER PRIMARY KEY,
                person_preview TEXT NOT NULL,
                garment_preview TEXT NOT NULL,
                result_filename TEXT NOT NULL,
                result_url TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| format!("Failed to create table: {}", e))?;
        Ok(Self { conn })
    }

    /// Stores a history entry
    pub fn insert(&self, entry: &HistoryEntry) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO tryon_history
                 (id, person_preview, garment_preview, result_filename, result_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    entry.id,
                    entry.person_preview,
                    entry.garment_preview,
                    entry.result_filename,
                    entry.result_url,
                    entry.created_at
                ],
            )
            .map_err(|e| format!("Failed to store history entry: {}", e))?;
        Ok(())
    }

    /// Deletes a history entry by id
    pub fn delete(&self, id: i64) -> Result<(), String> {
        self.conn
            .execute("DELETE FROM tryon_history WHERE id = ?1", params![id])
            .map_err(|e| format!("Failed to delete history entry: {}", e))?;
        Ok(())
    }

    /// Loads all history entries, newest first
    pub fn load(&self) -> Result<Vec<HistoryEntry>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, person_preview, garment_preview, result_filename, result_url, created_at
                 FROM tryon_history ORDER BY id DESC",
            )
            .map_err(|e| format!("Failed to prepare query: {}", e))?;

        let entries = stmt
            .query_map([], |row| {
                Ok(HistoryEntry {
                    id: row.get(0)?,
                    person_preview: row.get(1)?,
                    garment_preview: row.get(2)?,
                    result_filename: row.get(3)?,
                    result_url: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| format!("Failed to query: {}", e))?;

        Ok(entries.filter_map(|e| e.ok()).collect())
    }

    /// Clears all stored history
    pub fn clear(&self) -> Result<(), String> {
        self.conn
            .execute("DELETE FROM tryon_history", [])
            .map_err(|e| format!("Failed to clear history: {}", e))?;
        Ok(())
    }
}
