//! Relational input tables.
//!
//! Tables are read whole from a [`TableSource`] and held in memory as rows of
//! [`Value`]s. A cell that has no value (SQL `NULL`, a column absent from the
//! table, or a compound without a properties row) is [`Value::Missing`], never
//! a placeholder string.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::ReportError;

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Missing,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Display text for the value, `None` when missing.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Missing => None,
            Value::Text(s) => Some(Cow::Borrowed(s.as_str())),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Display text for the value when it is present and not blank.
    pub fn non_blank(&self) -> Option<Cow<'_, str>> {
        self.as_text().filter(|s| !s.trim().is_empty())
    }

    /// Canonical join-key form. Whole reals and integers compare equal, so a
    /// key stored as `2.0` on one side still matches `2` on the other.
    pub fn key(&self) -> Option<String> {
        match self {
            Value::Missing => None,
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(f) if f.is_finite() && f.fract() == 0.0 => Some((*f as i64).to_string()),
            Value::Real(f) => Some(f.to_string()),
            Value::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Missing)
    }
}

/// A named field → value mapping for one row of one table.
pub type Record = BTreeMap<String, Value>;

/// A fully loaded table: ordered column names and rows of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from column names and rows in one go.
    pub fn from_rows<C, R>(name: &str, columns: C, rows: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let mut table = Self::new(name, columns.into_iter().map(Into::into).collect());
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row. Short rows are padded with [`Value::Missing`]; extra
    /// trailing values are dropped.
    pub fn push_row(&mut self, mut values: Vec<Value>) {
        values.resize(self.columns.len(), Value::Missing);
        self.rows.push(values);
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Iterate rows as named records.
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows.iter().map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect::<Record>()
        })
    }

    /// Pivot a long `(key, name, value)` table into wide format: one row per
    /// key, one column per distinct property name. Keys keep first-seen
    /// order; property columns are sorted. A repeated `(key, name)` pair keeps
    /// the last value, matching `INSERT OR REPLACE` semantics upstream.
    pub fn pivot_wide(
        &self,
        name: &str,
        key_column: &str,
        name_column: &str,
        value_column: &str,
    ) -> Result<Table, ReportError> {
        let idx = |column: &str| {
            self.column_index(column).ok_or_else(|| {
                ReportError::DataSourceMissing(format!(
                    "column `{column}` in table `{}`",
                    self.name
                ))
            })
        };
        let (key_idx, name_idx, value_idx) =
            (idx(key_column)?, idx(name_column)?, idx(value_column)?);

        let mut order: Vec<Value> = Vec::new();
        let mut by_key: HashMap<String, BTreeMap<String, Value>> = HashMap::new();
        for row in &self.rows {
            let Some(key) = row[key_idx].key() else {
                continue;
            };
            let Some(prop) = row[name_idx].non_blank() else {
                continue;
            };
            let entry = by_key.entry(key).or_insert_with(|| {
                order.push(row[key_idx].clone());
                BTreeMap::new()
            });
            entry.insert(prop.trim().to_string(), row[value_idx].clone());
        }

        let mut props: Vec<String> = by_key
            .values()
            .flat_map(|m| m.keys().cloned())
            .collect();
        props.sort();
        props.dedup();

        let mut columns = vec![key_column.to_string()];
        columns.extend(props.iter().cloned());
        let mut wide = Table::new(name, columns);
        for key_value in order {
            let Some(values) = key_value.key().and_then(|k| by_key.remove(&k)) else {
                continue;
            };
            let mut row = vec![key_value];
            row.extend(
                props
                    .iter()
                    .map(|p| values.get(p).cloned().unwrap_or(Value::Missing)),
            );
            wide.push_row(row);
        }
        Ok(wide)
    }
}

/// Something that can hand out whole tables by name.
pub trait TableSource {
    fn has_table(&self, name: &str) -> Result<bool, ReportError>;

    /// Read the full table; a missing table is [`ReportError::DataSourceMissing`].
    fn read_table(&self, name: &str) -> Result<Table, ReportError>;
}

/// In-memory table store, used for tests and for callers that already hold
/// their data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name().to_string(), table);
    }
}

impl TableSource for MemoryStore {
    fn has_table(&self, name: &str) -> Result<bool, ReportError> {
        Ok(self.tables.contains_key(name))
    }

    fn read_table(&self, name: &str) -> Result<Table, ReportError> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| ReportError::DataSourceMissing(format!("table `{name}`")))
    }
}
