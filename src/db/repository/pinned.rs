use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{PinnedEntry, RiskRecord};

/// Store a pinned snapshot. Returns the new pin id.
pub fn insert_pinned(
    conn: &Connection,
    record: &RiskRecord,
    pinned_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        "INSERT INTO pinned_analyses (pinned_at, record_json) VALUES (?1, ?2)",
        params![pinned_at, json],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Remove a pin. Returns whether it existed.
pub fn delete_pinned(conn: &Connection, id: i64) -> Result<bool, DatabaseError> {
    let removed = conn.execute("DELETE FROM pinned_analyses WHERE id = ?1", [id])?;
    Ok(removed > 0)
}

/// All pins, most recent first (insertion order, not clock order). Rows whose snapshot no longer parses are skipped.
pub fn list_pinned(conn: &Connection) -> Result<Vec<PinnedEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, pinned_at, record_json FROM pinned_analyses
         ORDER BY id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, DateTime<Utc>>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, pinned_at, json) = row?;
        match serde_json::from_str::<RiskRecord>(&json) {
            Ok(record) => entries.push(PinnedEntry {
                id,
                pinned_at,
                record,
            }),
            Err(e) => tracing::warn!(id, error = %e, "Skipping unreadable pinned analysis"),
        }
    }
    Ok(entries)
}

/// Remove every pin.
pub fn clear_pinned(conn: &Connection) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM pinned_analyses", [])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::RiskCategory;

    fn record(id: &str, probability: f64) -> RiskRecord {
        RiskRecord::new(id.into(), Utc::now(), vec![], probability, vec![], None)
    }

    #[test]
    fn newest_pin_first_even_with_equal_timestamps() {
        let conn = open_memory_database().unwrap();
        let at = Utc::now();
        let first = insert_pinned(&conn, &record("a", 0.1), at).unwrap();
        let second = insert_pinned(&conn, &record("b", 0.9), at).unwrap();
        assert!(second > first);

        let pins = list_pinned(&conn).unwrap();
        assert_eq!(pins.len(), 2);
        assert_eq!(pins[0].record.id(), "b");
        assert_eq!(pins[1].record.id(), "a");
    }

    #[test]
    fn delete_removes_only_that_pin() {
        let conn = open_memory_database().unwrap();
        let a = insert_pinned(&conn, &record("a", 0.1), Utc::now()).unwrap();
        insert_pinned(&conn, &record("b", 0.2), Utc::now()).unwrap();
        assert!(delete_pinned(&conn, a).unwrap());
        assert!(!delete_pinned(&conn, a).unwrap());
        let pins = list_pinned(&conn).unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].record.id(), "b");
    }

    #[test]
    fn corrupt_snapshot_is_skipped() {
        let conn = open_memory_database().unwrap();
        insert_pinned(&conn, &record("ok", 0.5), Utc::now()).unwrap();
        conn.execute(
            "INSERT INTO pinned_analyses (pinned_at, record_json) VALUES (?1, 'not json')",
            params![Utc::now()],
        )
        .unwrap();
        let pins = list_pinned(&conn).unwrap();
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].record.id(), "ok");
    }

    #[test]
    fn listed_category_follows_probability() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO pinned_analyses (pinned_at, record_json) VALUES (?1, ?2)",
            params![
                Utc::now(),
                r#"{"id":"x","date":"2026-01-01T00:00:00Z","medications":[],
                    "riskProbability":0.9,"riskCategory":"Low","recommendations":[]}"#
            ],
        )
        .unwrap();
        let pins = list_pinned(&conn).unwrap();
        assert_eq!(pins[0].record.risk_category(), RiskCategory::High);
    }

    #[test]
    fn clear_removes_everything() {
        let conn = open_memory_database().unwrap();
        insert_pinned(&conn, &record("a", 0.1), Utc::now()).unwrap();
        insert_pinned(&conn, &record("b", 0.1), Utc::now()).unwrap();
        assert_eq!(clear_pinned(&conn).unwrap(), 2);
        assert!(list_pinned(&conn).unwrap().is_empty());
    }
}
