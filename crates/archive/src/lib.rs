use anyhow::Result;
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use storyboard::{Project, ProjectId};
use tracing::warn;

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("continuity_studio")
}

/// SQLite-backed project archive with load-all/replace-all semantics.
///
/// The in-memory session is the source of truth; callers treat a failed
/// save as log-only and retry on the next save.
pub struct ArchiveDb {
    conn: Connection,
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProjectEntry {
    pub id: String,
    pub title: String,
    pub last_modified: i64,
}

impl ArchiveDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        // Recommended PRAGMAs for local interactive app DB
        conn.pragma_update(None, "journal_mode", &"WAL")?;
        conn.pragma_update(None, "synchronous", &"NORMAL")?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every stored project, newest first. Rows that no longer parse
    /// are skipped with a warning instead of failing the whole load.
    pub fn load_all(&self) -> Result<Vec<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, json FROM projects ORDER BY last_modified DESC")?;
        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let json: String = row.get(1)?;
            Ok((id, json))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, json) = row?;
            match serde_json::from_str::<Project>(&json) {
                Ok(project) => out.push(project),
                Err(err) => warn!(%id, error = %err, "skipping unreadable project row"),
            }
        }
        Ok(out)
    }

    /// Replaces the whole archive with the given list in one transaction.
    pub fn save_all(&self, projects: &[Project]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM projects", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO projects(id, title, json, last_modified) VALUES(?1, ?2, ?3, ?4)",
            )?;
            for project in projects {
                stmt.execute(params![
                    project.id.to_string(),
                    project.title,
                    serde_json::to_string(project)?,
                    project.last_modified.timestamp(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn upsert_project(&self, project: &Project) -> Result<()> {
        self.conn.execute(
            "INSERT INTO projects(id, title, json, last_modified) VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, json = excluded.json, last_modified = excluded.last_modified",
            params![
                project.id.to_string(),
                project.title,
                serde_json::to_string(project)?,
                project.last_modified.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare("SELECT json FROM projects WHERE id = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![id.to_string()])?;
        if let Some(row) = rows.next()? {
            let json: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&json)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_project(&self, id: ProjectId) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM projects WHERE id = ?1", params![id.to_string()])?;
        Ok(deleted > 0)
    }

    pub fn list_entries(&self) -> Result<Vec<ProjectEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, last_modified FROM projects ORDER BY last_modified DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectEntry {
                id: row.get(0)?,
                title: row.get(1)?,
                last_modified: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
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
