//! On-disk layout of the tracking container.
//!
//! The container is a single SQLite file holding the queue table, one
//! dataset per trajectory path and the marker-position payload.

use std::fs;
use std::path::Path;

use ndarray::Array2;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};

use crate::tracking::error::{Result, TrackingError};
use crate::tracking::flow_queue::FlowQueue;
use crate::tracking::marker_positions::MarkerPositions;
use crate::tracking::record_schema::{decode_row, encode_row};

const FORMAT_NAME: &str = "markertrack-container";
const LAYOUT_VERSION: &str = "1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS layout (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS queues (
    row    INTEGER PRIMARY KEY,
    record BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS datasets (
    path TEXT PRIMARY KEY,
    rows INTEGER NOT NULL,
    cols INTEGER NOT NULL,
    unit TEXT NOT NULL,
    data BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS marker_positions (
    id      INTEGER PRIMARY KEY CHECK (id = 0),
    payload BLOB NOT NULL
);
";

/// A stored 2D integer dataset and its unit-of-measure attribute.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Dataset {
    pub data: Array2<i64>,
    pub unit: String,
}

/// Create an empty container at `path`, parent directories included.
pub(crate) fn create_template(path: &Path, marker_positions: &MarkerPositions) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.execute(
        "INSERT OR REPLACE INTO layout (key, value) VALUES ('format', ?1), ('version', ?2)",
        params![FORMAT_NAME, LAYOUT_VERSION],
    )?;
    tx.execute(
        "INSERT OR REPLACE INTO marker_positions (id, payload) VALUES (0, ?1)",
        params![marker_positions.as_bytes()],
    )?;
    tx.commit()?;
    Ok(())
}

/// Open an existing container for reading and writing.
pub(crate) fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)?;
    check_layout(&conn)?;
    Ok(conn)
}

/// Open an existing container without write access.
pub(crate) fn open_read_only(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    check_layout(&conn)?;
    Ok(conn)
}

fn check_layout(conn: &Connection) -> Result<()> {
    let has_layout: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'layout'",
        [],
        |row| row.get(0),
    )?;
    if has_layout == 0 {
        return Err(TrackingError::Corrupt(
            "missing layout table, not a tracking container".into(),
        ));
    }

    let value = |key: &str| -> Result<Option<String>> {
        Ok(conn
            .query_row("SELECT value FROM layout WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    };
    match value("format")?.as_deref() {
        Some(FORMAT_NAME) => {}
        other => {
            return Err(TrackingError::Corrupt(format!(
                "unexpected container format {other:?}"
            )));
        }
    }
    match value("version")?.as_deref() {
        Some(LAYOUT_VERSION) => Ok(()),
        other => Err(TrackingError::Corrupt(format!(
            "unsupported layout version {other:?}"
        ))),
    }
}

pub(crate) fn read_marker_positions(conn: &Connection) -> Result<MarkerPositions> {
    let payload: Option<Vec<u8>> = conn
        .query_row(
            "SELECT payload FROM marker_positions WHERE id = 0",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(payload.map(MarkerPositions::from_bytes).unwrap_or_default())
}

/// Read the queue table in persisted row order.
pub(crate) fn read_queues(conn: &Connection) -> Result<Vec<FlowQueue>> {
    let mut stmt = conn.prepare("SELECT record FROM queues ORDER BY row")?;
    let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

    let mut queues = Vec::new();
    for row in rows {
        queues.push(decode_row(&row?)?);
    }
    Ok(queues)
}

/// Replace the queue table with exactly `queues`, in order.
pub(crate) fn write_queues(conn: &mut Connection, queues: &[FlowQueue]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM queues", [])?;
    {
        let mut insert = tx.prepare("INSERT INTO queues (row, record) VALUES (?1, ?2)")?;
        for (row, queue) in queues.iter().enumerate() {
            let row = i64::try_from(row)
                .map_err(|_| TrackingError::Corrupt(format!("queue row {row} out of range")))?;
            insert.execute(params![row, &encode_row(queue)[..]])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub(crate) fn read_dataset(conn: &Connection, path: &str) -> Result<Option<Dataset>> {
    let stored = conn
        .query_row(
            "SELECT rows, cols, unit, data FROM datasets WHERE path = ?1",
            [path],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((rows, cols, unit, bytes)) = stored else {
        return Ok(None);
    };

    let corrupt = |reason: String| TrackingError::Corrupt(format!("dataset {path}: {reason}"));
    let rows = usize::try_from(rows).map_err(|_| corrupt(format!("negative row count {rows}")))?;
    let cols = usize::try_from(cols).map_err(|_| corrupt(format!("negative column count {cols}")))?;
    if bytes.len() != rows * cols * 8 {
        return Err(corrupt(format!(
            "{} bytes of data for shape ({rows}, {cols})",
            bytes.len()
        )));
    }

    let values = bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            i64::from_le_bytes(buf)
        })
        .collect();
    let data = Array2::from_shape_vec((rows, cols), values).map_err(|e| corrupt(e.to_string()))?;
    Ok(Some(Dataset { data, unit }))
}

/// Store `dataset` at `path`, replacing any previous dataset there.
pub(crate) fn write_dataset(conn: &Connection, path: &str, dataset: &Dataset) -> Result<()> {
    let (rows, cols) = dataset.data.dim();
    let mut bytes = Vec::with_capacity(rows * cols * 8);
    for value in dataset.data.iter() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    conn.execute(
        "INSERT OR REPLACE INTO datasets (path, rows, cols, unit, data) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![path, rows as i64, cols as i64, dataset.unit, bytes],
    )?;
    Ok(())
}

pub(crate) fn has_dataset(conn: &Connection, path: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM datasets WHERE path = ?1",
        [path],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn delete_dataset(conn: &Connection, path: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM datasets WHERE path = ?1", [path])?;
    Ok(removed > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn template() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tracking.db");
        create_template(&path, &MarkerPositions::from_bytes(b"layout".to_vec())).unwrap();
        let conn = open(&path).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_template_is_empty() {
        let (_dir, conn) = template();

        assert!(read_queues(&conn).unwrap().is_empty());
        assert_eq!(read_marker_positions(&conn).unwrap().as_bytes(), b"layout");
    }

    #[test]
    fn test_queue_table_is_resized() {
        let (_dir, mut conn) = template();
        let queues = vec![
            FlowQueue::new([1, 2], 0, 10, 0, 0, "a").unwrap(),
            FlowQueue::new([3, 4], 0, 10, 1, 0, "b").unwrap().with_done(true),
            FlowQueue::new([5, 6], 5, 10, 1, 2, "c").unwrap(),
        ];
        write_queues(&mut conn, &queues).unwrap();
        write_queues(&mut conn, &queues[1..]).unwrap();

        let stored = read_queues(&conn).unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored[0].same_state(&queues[1]));
        assert!(stored[1].same_state(&queues[2]));
    }

    #[test]
    fn test_dataset_storage() {
        let (_dir, conn) = template();
        let path = "/trajectory/camera_0/z_0/label_a/xy";
        assert!(read_dataset(&conn, path).unwrap().is_none());

        let dataset = Dataset {
            data: array![[1, 2], [-1, -1], [i64::MAX, i64::MIN]],
            unit: "pixel".into(),
        };
        write_dataset(&conn, path, &dataset).unwrap();

        assert!(has_dataset(&conn, path).unwrap());
        assert_eq!(read_dataset(&conn, path).unwrap(), Some(dataset));
        assert!(delete_dataset(&conn, path).unwrap());
        assert!(!has_dataset(&conn, path).unwrap());
    }

    #[test]
    fn test_rejects_foreign_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE things (id INTEGER);")
            .unwrap();

        assert!(matches!(open(&path), Err(TrackingError::Corrupt(_))));
    }
}
