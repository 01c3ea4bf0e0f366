use super::{Db, StorageError, StorageResult};
use crate::models::{PartType, ValidationError};
use rusqlite::{params, Connection};

pub const DEFAULT_PART_TYPES: &[&str] = &[
    "Resistor",
    "Capacitor",
    "Inductor",
    "Diode",
    "LED",
    "Transistor",
    "IC",
    "OpAmp",
    "Connector",
    "Crystal",
    "Relay",
    "Switch",
    "Fuse",
    "Sensor",
    "Module",
    "Other",
];

/// Insert missing default types, returning how many were added
pub(super) fn seed_defaults(conn: &Connection) -> StorageResult<usize> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO part_types (name) VALUES (?1)")?;
    let mut added = 0;
    for name in DEFAULT_PART_TYPES {
        added += stmt.execute(params![name])?;
    }
    Ok(added)
}

fn row_to_part_type(row: &rusqlite::Row<'_>) -> Result<PartType, rusqlite::Error> {
    Ok(PartType {
        part_type_id: row.get("part_type_id")?,
        name: row.get("name")?,
    })
}

#[derive(Debug, Clone)]
pub struct PartTypeRepository {
    db: Db,
}

impl PartTypeRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn list(&self) -> StorageResult<Vec<PartType>> {
        let conn = self.db.open_connection()?;
        let mut stmt =
            conn.prepare("SELECT part_type_id, name FROM part_types ORDER BY name COLLATE NOCASE")?;
        let rows = stmt.query_map([], row_to_part_type)?;
        let items = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn create(&self, name: &str) -> StorageResult<PartType> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingPartTypeName.into());
        }

        let conn = self.db.open_connection()?;
        conn.execute("INSERT INTO part_types (name) VALUES (?1)", params![name])
            .map_err(|e| {
                StorageError::from_write(e, || format!("Part type '{}' already exists", name))
            })?;

        Ok(PartType {
            part_type_id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    pub fn seed(&self) -> StorageResult<usize> {
        let conn = self.db.open_connection()?;
        seed_defaults(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo() -> (TempDir, PartTypeRepository) {
        let dir = TempDir::new().unwrap();
        let db = Db::open(&dir.path().join("binner.db"), 1).unwrap();
        (dir, PartTypeRepository::new(db))
    }

    #[test]
    fn test_defaults_are_seeded_once() {
        let (_dir, repo) = repo();
        let types = repo.list().unwrap();
        assert_eq!(types.len(), DEFAULT_PART_TYPES.len());
        assert_eq!(repo.seed().unwrap(), 0);
        assert!(types.iter().any(|t| t.name == "Resistor"));
    }

    #[test]
    fn test_create_rejects_duplicates_and_blanks() {
        let (_dir, repo) = repo();
        let created = repo.create("  Potentiometer ").unwrap();
        assert_eq!(created.name, "Potentiometer");

        assert!(matches!(
            repo.create("potentiometer"),
            Err(StorageError::Conflict(_))
        ));
        assert!(matches!(
            repo.create("   "),
            Err(StorageError::Invalid(ValidationError::MissingPartTypeName))
        ));
    }
}
