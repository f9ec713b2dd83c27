//! Record table access
//!
//! SQL narrows by collection, id, `created_at` and extracted JSON fields;
//! attribute predicates are evaluated on decoded records so id
//! normalization applies uniformly.

use crate::db::{RecordId, StoreRecord, TimeRange};
use crate::error::{AppError, Result};
use chrono::{TimeZone, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::{Map, Value};

type RawRecord = (String, i64, String);

fn read_raw(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode(collection: &str, (id, created_ms, attributes): RawRecord) -> Result<StoreRecord> {
    let created_at = Utc
        .timestamp_millis_opt(created_ms)
        .single()
        .ok_or_else(|| {
            AppError::DataSource(format!(
                "record {}/{} has invalid created_at {}",
                collection, id, created_ms
            ))
        })?;

    let attributes: Map<String, Value> = serde_json::from_str(&attributes).map_err(|e| {
        AppError::DataSource(format!(
            "record {}/{} has corrupt attributes: {}",
            collection, id, e
        ))
    })?;

    Ok(StoreRecord {
        id: RecordId::new(id),
        created_at,
        attributes,
    })
}

fn collect(
    collection: &str,
    rows: impl Iterator<Item = rusqlite::Result<RawRecord>>,
) -> Result<Vec<StoreRecord>> {
    rows.map(|row| decode(collection, row?)).collect()
}

/// Insert or replace a record
pub fn upsert_record(conn: &Connection, collection: &str, record: &StoreRecord) -> Result<()> {
    let attributes = serde_json::to_string(&record.attributes)?;
    conn.execute(
        "INSERT INTO records (collection, id, created_at, attributes)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET
             created_at = excluded.created_at,
             attributes = excluded.attributes",
        params![
            collection,
            record.id.as_str(),
            record.created_at.timestamp_millis(),
            attributes
        ],
    )?;
    Ok(())
}

/// Records of a collection inside a time range, in fetch order
pub fn query_records(
    conn: &Connection,
    collection: &str,
    range: &TimeRange,
) -> Result<Vec<StoreRecord>> {
    let start = range.start.map(|t| t.timestamp_millis());
    let end = range.end.map(|t| t.timestamp_millis());

    let mut stmt = conn.prepare(
        "SELECT id, created_at, attributes
         FROM records
         WHERE collection = ?1
           AND (?2 IS NULL OR created_at >= ?2)
           AND (?3 IS NULL OR created_at < ?3)
         ORDER BY created_at ASC, id ASC",
    )?;

    let rows = stmt.query_map(params![collection, start, end], read_raw)?;
    collect(collection, rows)
}

/// Records of a collection with the given ids, in fetch order
pub fn find_records_by_ids(
    conn: &Connection,
    collection: &str,
    ids: &[RecordId],
) -> Result<Vec<StoreRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
    let sql = format!(
        "SELECT id, created_at, attributes
         FROM records
         WHERE collection = ?1 AND id IN ({})
         ORDER BY created_at ASC, id ASC",
        placeholders.join(", ")
    );

    let mut bind: Vec<&str> = Vec::with_capacity(ids.len() + 1);
    bind.push(collection);
    bind.extend(ids.iter().map(RecordId::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bind), read_raw)?;
    collect(collection, rows)
}

/// JSON path of a dotted attribute, with every segment quoted
fn json_path(field: &str) -> Option<String> {
    if field.is_empty() || field.contains('"') {
        return None;
    }
    let segments: Vec<String> = field.split('.').map(|s| format!("\"{}\"", s)).collect();
    Some(format!("$.{}", segments.join(".")))
}

/// Records of a collection whose `field` (or its `$oid`) is one of `values`
///
/// This is a pre-selection; callers still compare normalized ids. Fields
/// that cannot be expressed as a JSON path fall back to a collection scan.
pub fn find_records_by_field(
    conn: &Connection,
    collection: &str,
    field: &str,
    values: &[RecordId],
) -> Result<Vec<StoreRecord>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    let Some(path) = json_path(field) else {
        return query_records(conn, collection, &TimeRange::all());
    };

    let placeholders: Vec<String> = (0..values.len()).map(|i| format!("?{}", i + 4)).collect();
    let placeholders = placeholders.join(", ");
    let sql = format!(
        "SELECT id, created_at, attributes
         FROM records
         WHERE collection = ?1
           AND (trim(CAST(json_extract(attributes, ?2) AS TEXT)) IN ({0})
                OR trim(CAST(json_extract(attributes, ?3) AS TEXT)) IN ({0}))
         ORDER BY created_at ASC, id ASC",
        placeholders
    );

    let oid_path = format!("{}.\"$oid\"", path);
    let mut bind: Vec<&str> = Vec::with_capacity(values.len() + 3);
    bind.push(collection);
    bind.push(&path);
    bind.push(&oid_path);
    bind.extend(values.iter().map(RecordId::as_str));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(bind), read_raw)?;
    collect(collection, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::migrations::run_migrations;
    use chrono::DateTime;
    use serde_json::json;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_upsert_and_query_range() {
        let conn = create_test_db();
        upsert_record(&conn, "scrapper", &StoreRecord::new("a", at(1, 10))).unwrap();
        upsert_record(&conn, "scrapper", &StoreRecord::new("b", at(2, 0))).unwrap();
        upsert_record(&conn, "scrapper", &StoreRecord::new("c", at(2, 23))).unwrap();
        upsert_record(&conn, "other", &StoreRecord::new("d", at(2, 1))).unwrap();

        let day_two = TimeRange::between(at(2, 0), at(3, 0));
        let found = query_records(&conn, "scrapper", &day_two).unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);

        let all = query_records(&conn, "scrapper", &TimeRange::all()).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_upsert_replaces_attributes() {
        let conn = create_test_db();
        let record = StoreRecord::new("a", at(1, 0)).with("status", "Pending");
        upsert_record(&conn, "datasources", &record).unwrap();
        let record = record.with("status", "Active");
        upsert_record(&conn, "datasources", &record).unwrap();

        let found = find_records_by_ids(&conn, "datasources", &[RecordId::new("a")]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attribute("status"), Some(&json!("Active")));
    }

    #[test]
    fn test_find_by_ids_ignores_unknown() {
        let conn = create_test_db();
        upsert_record(&conn, "companies", &StoreRecord::new("C1", at(1, 0))).unwrap();
        let found = find_records_by_ids(
            &conn,
            "companies",
            &[RecordId::new("C1"), RecordId::new("C404")],
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert!(find_records_by_ids(&conn, "companies", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_find_by_field_selects_in_sql() {
        let conn = create_test_db();
        let rows = [
            StoreRecord::new("S1", at(1, 0)).with("raw_source_id", json!({"$oid": "T1"})),
            StoreRecord::new("S2", at(1, 1)).with("raw_source_id", " T2 "),
            StoreRecord::new("S3", at(1, 2)).with("raw_source_id", json!({"$oid": "T3"})),
            StoreRecord::new("S4", at(1, 3)).with("meta", json!({"raw": 7})),
            StoreRecord::new("S5", at(1, 4)),
        ];
        for row in &rows {
            upsert_record(&conn, "datasources", row).unwrap();
        }
        upsert_record(
            &conn,
            "companies",
            &StoreRecord::new("C1", at(1, 0)).with("raw_source_id", "T1"),
        )
        .unwrap();

        let found = find_records_by_field(
            &conn,
            "datasources",
            "raw_source_id",
            &[RecordId::new("T1"), RecordId::new("T2")],
        )
        .unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2"]);

        let found =
            find_records_by_field(&conn, "datasources", "meta.raw", &[RecordId::new("7")]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.as_str(), "S4");

        assert!(find_records_by_field(&conn, "datasources", "raw_source_id", &[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_json_path_quotes_segments() {
        assert_eq!(json_path("company_id").as_deref(), Some(r#"$."company_id""#));
        assert_eq!(json_path("a.b").as_deref(), Some(r#"$."a"."b""#));
        assert_eq!(json_path(r#"we"ird"#), None);
        assert_eq!(json_path(""), None);
    }

    #[test]
    fn test_corrupt_attributes_are_data_source_errors() {
        let conn = create_test_db();
        conn.execute(
            "INSERT INTO records (collection, id, created_at, attributes) VALUES ('c', 'x', 0, 'not json')",
            [],
        )
        .unwrap();
        let err = query_records(&conn, "c", &TimeRange::all()).unwrap_err();
        assert!(err.is_data_source());
    }
}
