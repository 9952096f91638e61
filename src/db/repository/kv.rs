use rusqlite::{params, Connection};

use crate::db::DatabaseError;

/// Get a value by key. Returns None if not set.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT value FROM key_values WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Set a value (upsert).
pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO key_values (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Delete a value. Returns whether a row existed.
pub fn delete_value(conn: &Connection, key: &str) -> Result<bool, DatabaseError> {
    let removed = conn.execute("DELETE FROM key_values WHERE key = ?1", [key])?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn missing_key_is_none() {
        let conn = open_memory_database().unwrap();
        assert_eq!(get_value(&conn, "user").unwrap(), None);
    }

    #[test]
    fn set_then_overwrite() {
        let conn = open_memory_database().unwrap();
        set_value(&conn, "theme", "light").unwrap();
        set_value(&conn, "theme", "dark").unwrap();
        assert_eq!(get_value(&conn, "theme").unwrap().as_deref(), Some("dark"));
    }

    #[test]
    fn delete_reports_presence() {
        let conn = open_memory_database().unwrap();
        set_value(&conn, "user", "{}").unwrap();
        assert!(delete_value(&conn, "user").unwrap());
        assert!(!delete_value(&conn, "user").unwrap());
        assert_eq!(get_value(&conn, "user").unwrap(), None);
    }
}
