use super::{like_pattern, Db, StorageError, StorageResult};
use crate::models::{NewPart, Part, PartListQuery};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

const PART_COLUMNS: &str = r#"
  part_id,
  part_number,
  quantity,
  low_stock_threshold,
  part_type,
  keywords,
  description,
  datasheet_url,
  digikey_part_number,
  mouser_part_number,
  location,
  bin_number,
  bin_number2,
  cost,
  lowest_cost_supplier,
  lowest_cost_supplier_url,
  product_url,
  manufacturer,
  manufacturer_part_number,
  image_url,
  project_id,
  date_created_utc
"#;

fn row_to_part(row: &rusqlite::Row<'_>) -> Result<Part, rusqlite::Error> {
    let keywords: String = row.get("keywords")?;
    Ok(Part {
        part_id: row.get("part_id")?,
        fields: NewPart {
            part_number: row.get("part_number")?,
            quantity: row.get("quantity")?,
            low_stock_threshold: row.get("low_stock_threshold")?,
            part_type: row.get("part_type")?,
            keywords: keywords.split_whitespace().map(str::to_string).collect(),
            description: row.get("description")?,
            datasheet_url: row.get("datasheet_url")?,
            digikey_part_number: row.get("digikey_part_number")?,
            mouser_part_number: row.get("mouser_part_number")?,
            location: row.get("location")?,
            bin_number: row.get("bin_number")?,
            bin_number2: row.get("bin_number2")?,
            cost: row.get("cost")?,
            lowest_cost_supplier: row.get("lowest_cost_supplier")?,
            lowest_cost_supplier_url: row.get("lowest_cost_supplier_url")?,
            product_url: row.get("product_url")?,
            manufacturer: row.get("manufacturer")?,
            manufacturer_part_number: row.get("manufacturer_part_number")?,
            image_url: row.get("image_url")?,
            project_id: row.get("project_id")?,
        },
        date_created_utc: row.get::<_, DateTime<Utc>>("date_created_utc")?,
    })
}

fn get_by_id(conn: &Connection, part_id: i64) -> StorageResult<Option<Part>> {
    let sql = format!("SELECT {PART_COLUMNS} FROM parts WHERE part_id = ?1");
    Ok(conn
        .query_row(&sql, params![part_id], row_to_part)
        .optional()?)
}

fn query_parts(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<Vec<Part>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, row_to_part)?;
    let items = rows.collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

fn conflict_message(part_number: &str) -> String {
    format!("Part number '{}' already exists", part_number)
}

/// CRUD and queries over the `parts` table
#[derive(Debug, Clone)]
pub struct PartRepository {
    db: Db,
}

impl PartRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn create(&self, mut part: NewPart) -> StorageResult<Part> {
        part.validate()?;

        let conn = self.db.open_connection()?;
        let date_created_utc = Utc::now();
        conn.execute(
            r#"
INSERT INTO parts (
  part_number, quantity, low_stock_threshold, part_type, keywords, description,
  datasheet_url, digikey_part_number, mouser_part_number, location, bin_number,
  bin_number2, cost, lowest_cost_supplier, lowest_cost_supplier_url, product_url,
  manufacturer, manufacturer_part_number, image_url, project_id, date_created_utc
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
"#,
            params![
                part.part_number,
                part.quantity,
                part.low_stock_threshold,
                part.part_type,
                part.keywords.join(" "),
                part.description,
                part.datasheet_url,
                part.digikey_part_number,
                part.mouser_part_number,
                part.location,
                part.bin_number,
                part.bin_number2,
                part.cost,
                part.lowest_cost_supplier,
                part.lowest_cost_supplier_url,
                part.product_url,
                part.manufacturer,
                part.manufacturer_part_number,
                part.image_url,
                part.project_id,
                date_created_utc,
            ],
        )
        .map_err(|e| StorageError::from_write(e, || conflict_message(&part.part_number)))?;

        let part_id = conn.last_insert_rowid();
        debug!(part_id, part_number = %part.part_number, "part created");
        Ok(Part {
            part_id,
            fields: part,
            date_created_utc,
        })
    }

    pub fn get(&self, part_id: i64) -> StorageResult<Option<Part>> {
        let conn = self.db.open_connection()?;
        get_by_id(&conn, part_id)
    }

    /// Case-insensitive lookup
    pub fn get_by_part_number(&self, part_number: &str) -> StorageResult<Option<Part>> {
        let conn = self.db.open_connection()?;
        let sql = format!("SELECT {PART_COLUMNS} FROM parts WHERE part_number = ?1");
        Ok(conn
            .query_row(&sql, params![part_number.trim()], row_to_part)
            .optional()?)
    }

    /// Overwrite every editable field; `date_created_utc` is preserved
    pub fn update(&self, mut part: Part) -> StorageResult<Part> {
        part.validate()?;

        let conn = self.db.open_connection()?;
        let fields = &part.fields;
        let changed = conn
            .execute(
                r#"
UPDATE parts SET
  part_number = ?2, quantity = ?3, low_stock_threshold = ?4, part_type = ?5,
  keywords = ?6, description = ?7, datasheet_url = ?8, digikey_part_number = ?9,
  mouser_part_number = ?10, location = ?11, bin_number = ?12, bin_number2 = ?13,
  cost = ?14, lowest_cost_supplier = ?15, lowest_cost_supplier_url = ?16,
  product_url = ?17, manufacturer = ?18, manufacturer_part_number = ?19,
  image_url = ?20, project_id = ?21
WHERE part_id = ?1
"#,
                params![
                    part.part_id,
                    fields.part_number,
                    fields.quantity,
                    fields.low_stock_threshold,
                    fields.part_type,
                    fields.keywords.join(" "),
                    fields.description,
                    fields.datasheet_url,
                    fields.digikey_part_number,
                    fields.mouser_part_number,
                    fields.location,
                    fields.bin_number,
                    fields.bin_number2,
                    fields.cost,
                    fields.lowest_cost_supplier,
                    fields.lowest_cost_supplier_url,
                    fields.product_url,
                    fields.manufacturer,
                    fields.manufacturer_part_number,
                    fields.image_url,
                    fields.project_id,
                ],
            )
            .map_err(|e| StorageError::from_write(e, || conflict_message(&fields.part_number)))?;

        if changed == 0 {
            return Err(StorageError::NotFound(format!(
                "Part {} not found",
                part.part_id
            )));
        }

        get_by_id(&conn, part.part_id)?
            .ok_or_else(|| StorageError::NotFound(format!("Part {} not found", part.part_id)))
    }

    pub fn delete(&self, part_id: i64) -> StorageResult<bool> {
        let conn = self.db.open_connection()?;
        let changed = conn.execute("DELETE FROM parts WHERE part_id = ?1", params![part_id])?;
        Ok(changed > 0)
    }

    pub fn list(&self, query: &PartListQuery) -> StorageResult<Vec<Part>> {
        let conn = self.db.open_connection()?;
        let sql = format!(
            "SELECT {PART_COLUMNS} FROM parts ORDER BY {} {}, part_id ASC LIMIT ?1 OFFSET ?2",
            query.order_by.column(),
            query.direction.sql()
        );
        let limit = i64::from(query.limit());
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        query_parts(&conn, &sql, &[&limit as &dyn rusqlite::ToSql, &offset])
    }

    /// Every whitespace separated term must appear in the part number,
    /// keywords, description or manufacturer part number
    pub fn search(&self, keywords: &str) -> StorageResult<Vec<Part>> {
        let terms: Vec<String> = keywords.split_whitespace().map(like_pattern).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let clauses: Vec<String> = (1..=terms.len())
            .map(|i| {
                format!(
                    "(part_number LIKE ?{i} ESCAPE '\\' OR keywords LIKE ?{i} ESCAPE '\\' \
                     OR description LIKE ?{i} ESCAPE '\\' OR manufacturer_part_number LIKE ?{i} ESCAPE '\\')"
                )
            })
            .collect();
        let sql = format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE {} ORDER BY part_number ASC",
            clauses.join(" AND ")
        );

        let conn = self.db.open_connection()?;
        let args: Vec<&dyn rusqlite::ToSql> =
            terms.iter().map(|t| t as &dyn rusqlite::ToSql).collect();
        query_parts(&conn, &sql, &args)
    }

    pub fn low_stock(&self) -> StorageResult<Vec<Part>> {
        let conn = self.db.open_connection()?;
        let sql = format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE quantity <= low_stock_threshold ORDER BY quantity ASC, part_number ASC"
        );
        query_parts(&conn, &sql, &[])
    }
}
