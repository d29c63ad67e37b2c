// src/db/models.rs

//! Data models for pkgflow database entities
//!
//! Rust structs that correspond to database tables, with methods for
//! creating, reading, updating, and deleting records.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

/// An installed package version
#[derive(Debug, Clone)]
pub struct Trove {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub architecture: Option<String>,
    pub description: Option<String>,
    /// Name of the package source it was installed from
    pub source: Option<String>,
    pub installed_at: Option<String>,
    pub installed_by_changeset_id: Option<i64>,
}

const TROVE_COLUMNS: &str =
    "id, name, version, architecture, description, source, installed_at, installed_by_changeset_id";

impl Trove {
    /// Create a new Trove
    pub fn new(name: String, version: String) -> Self {
        Self {
            id: None,
            name,
            version,
            architecture: None,
            description: None,
            source: None,
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Insert this trove into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO troves (name, version, architecture, description, source, installed_by_changeset_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.name,
                &self.version,
                &self.architecture,
                &self.description,
                &self.source,
                &self.installed_by_changeset_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find troves by name (case-insensitive)
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM troves WHERE name = ?1 ORDER BY version",
            TROVE_COLUMNS
        ))?;

        let troves = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(troves)
    }

    /// List troves, optionally only those whose name contains `pattern`
    pub fn list(conn: &Connection, pattern: Option<&str>) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM troves WHERE ?1 IS NULL OR name LIKE '%' || ?1 || '%' ORDER BY name, version",
            TROVE_COLUMNS
        ))?;

        let troves = stmt
            .query_map([pattern], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(troves)
    }

    /// Delete a trove by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM troves WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            architecture: row.get(3)?,
            description: row.get(4)?,
            source: row.get(5)?,
            installed_at: row.get(6)?,
            installed_by_changeset_id: row.get(7)?,
        })
    }
}

/// Changeset status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    RolledBack,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::RolledBack => "rolled_back",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "rolled_back" => Ok(ChangesetStatus::RolledBack),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset groups the database changes of one install or removal
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
}

impl Changeset {
    /// Create a new Changeset
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
        }
    }

    /// Insert this changeset into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a changeset by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at FROM changesets WHERE id = ?1",
        )?;

        let changeset = stmt.query_row([id], Self::from_row).optional()?;

        Ok(changeset)
    }

    /// List all changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at FROM changesets ORDER BY id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// Update changeset status
    pub fn update_status(&mut self, conn: &Connection, new_status: ChangesetStatus) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update changeset without ID".to_string()))?;

        match new_status {
            ChangesetStatus::Applied => conn.execute(
                "UPDATE changesets SET status = ?1, applied_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
            ChangesetStatus::RolledBack => conn.execute(
                "UPDATE changesets SET status = ?1, rolled_back_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
            ChangesetStatus::Pending => conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?,
        };

        self.status = new_status;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str.parse::<ChangesetStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
            )
        })?;

        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
        })
    }
}

/// A stored configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

impl Setting {
    pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Insert or replace a setting
    pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete(conn: &Connection, key: &str) -> Result<()> {
        conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let settings = stmt
            .query_map([], |row| {
                Ok(Self {
                    key: row.get(0)?,
                    value: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_trove_insert_and_find_case_insensitive() {
        let conn = create_test_db();

        let mut trove = Trove::new("Contoso.Lib".to_string(), "1.2".to_string());
        trove.source = Some("main".to_string());
        let id = trove.insert(&conn).unwrap();
        assert!(id > 0);

        let found = Trove::find_by_name(&conn, "contoso.lib").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Contoso.Lib");
        assert_eq!(found[0].source.as_deref(), Some("main"));
    }

    #[test]
    fn test_trove_list_with_pattern() {
        let conn = create_test_db();
        Trove::new("alpha".to_string(), "1".to_string()).insert(&conn).unwrap();
        Trove::new("beta".to_string(), "1".to_string()).insert(&conn).unwrap();

        assert_eq!(Trove::list(&conn, None).unwrap().len(), 2);
        let filtered = Trove::list(&conn, Some("alp")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "alpha");
    }

    #[test]
    fn test_trove_delete() {
        let conn = create_test_db();
        let id = Trove::new("gone".to_string(), "1".to_string()).insert(&conn).unwrap();
        Trove::delete(&conn, id).unwrap();
        assert!(Trove::find_by_name(&conn, "gone").unwrap().is_empty());
    }

    #[test]
    fn test_changeset_lifecycle() {
        let conn = create_test_db();

        let mut changeset = Changeset::new("Install B-1.0".to_string());
        let id = changeset.insert(&conn).unwrap();
        changeset.update_status(&conn, ChangesetStatus::Applied).unwrap();

        let found = Changeset::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.status, ChangesetStatus::Applied);
        assert!(found.applied_at.is_some());
        assert_eq!(Changeset::list_all(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_changeset_status_parse() {
        assert_eq!("rolled_back".parse::<ChangesetStatus>().unwrap(), ChangesetStatus::RolledBack);
        assert!("bogus".parse::<ChangesetStatus>().is_err());
    }

    #[test]
    fn test_setting_upsert() {
        let conn = create_test_db();
        assert_eq!(Setting::get(&conn, "dependencies.enabled").unwrap(), None);

        Setting::set(&conn, "dependencies.enabled", "false").unwrap();
        Setting::set(&conn, "dependencies.enabled", "true").unwrap();
        assert_eq!(Setting::get(&conn, "dependencies.enabled").unwrap().as_deref(), Some("true"));
        assert_eq!(Setting::list_all(&conn).unwrap().len(), 1);

        Setting::delete(&conn, "dependencies.enabled").unwrap();
        assert!(Setting::list_all(&conn).unwrap().is_empty());
    }
}
