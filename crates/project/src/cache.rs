use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Project;

const LAST_ACTIVE_KEY: &str = "last_active_project";

/// Fire-and-forget local store for project snapshots. Writes are
/// last-writer-wins and never coordinated across windows.
pub struct ProjectCache {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CachedProjectInfo {
    pub id: String,
    pub name: String,
    pub updated_at: i64,
}

impl ProjectCache {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // Recommended PRAGMAs for local interactive app DB
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        let json = serde_json::to_string(project)?;
        self.conn.execute(
            "INSERT INTO projects(id, name, json, updated_at) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, json = excluded.json, updated_at = excluded.updated_at",
            params![
                project.id,
                project.name,
                json,
                project.updated_at.timestamp()
            ],
        )?;
        Ok(())
    }

    pub fn load_project(&self, id: &str) -> Result<Option<Project>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT json FROM projects WHERE id = ?1 LIMIT 1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn list_projects(&self) -> Result<Vec<CachedProjectInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, updated_at FROM projects ORDER BY updated_at DESC")?;
        let rows = stmt.query_map([], |row| {
            Ok(CachedProjectInfo {
                id: row.get(0)?,
                name: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn delete_project(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        if self.last_active()?.as_deref() == Some(id) {
            self.conn.execute(
                "DELETE FROM workspace_state WHERE key = ?1",
                params![LAST_ACTIVE_KEY],
            )?;
        }
        Ok(())
    }

    pub fn set_last_active(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workspace_state(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![LAST_ACTIVE_KEY, id],
        )?;
        Ok(())
    }

    pub fn last_active(&self) -> Result<Option<String>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM workspace_state WHERE key = ?1 LIMIT 1",
                params![LAST_ACTIVE_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    // Simple migration tracking by name
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params!["V0001__init"],
    )?;
    Ok(())
}
