//! Read-only access to the compounds database.

use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::ReportError;
use crate::table::{Table, TableSource, Value};

/// A SQLite database opened read-only. Tables are read in full.
pub struct SqliteStore {
    path: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Open an existing database. A path that does not exist is
    /// [`ReportError::DataSourceMissing`] rather than an empty database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ReportError::DataSourceMissing(format!(
                "database '{}'",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        log::debug!("opened database '{}'", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableSource for SqliteStore {
    fn has_table(&self, name: &str) -> Result<bool, ReportError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
            [name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn read_table(&self, name: &str) -> Result<Table, ReportError> {
        if !self.has_table(name)? {
            return Err(ReportError::DataSourceMissing(format!(
                "table `{name}` in '{}'",
                self.path.display()
            )));
        }

        let sql = format!("SELECT * FROM \"{}\"", name.replace('"', "\"\""));
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut table = Table::new(name, columns);

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(match row.get_ref(i)? {
                    ValueRef::Null => Value::Missing,
                    ValueRef::Integer(v) => Value::Integer(v),
                    ValueRef::Real(v) => Value::Real(v),
                    ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
                    // Blobs carry nothing displayable in a report cell.
                    ValueRef::Blob(_) => Value::Missing,
                });
            }
            table.push_row(values);
        }

        log::debug!("read {} rows from `{name}`", table.len());
        Ok(table)
    }
}
