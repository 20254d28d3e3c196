//! Relational merge – left-joins the core compound table with the wide
//! properties table on the compound key.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::ReportError;
use crate::schema::{FieldRef, Source};
use crate::table::{Record, Table, Value};

static MISSING: Value = Value::Missing;

/// One core row joined with its (optional) properties row.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    /// Canonical join key, `None` when the core row has no key value.
    pub key: Option<String>,
    pub core: Record,
    pub properties: Option<Record>,
}

impl MergedRow {
    /// Look a field up in the given table. Absent fields are [`Value::Missing`].
    pub fn get(&self, source: Source, field: &str) -> &Value {
        let record = match source {
            Source::Core => Some(&self.core),
            Source::Properties => self.properties.as_ref(),
        };
        record.and_then(|r| r.get(field)).unwrap_or(&MISSING)
    }

    /// Look a field up in the properties table first, then the core table.
    pub fn lookup(&self, field: &str) -> &Value {
        match self.get(Source::Properties, field) {
            Value::Missing => self.get(Source::Core, field),
            v => v,
        }
    }

    /// Resolve a field reference. Without an explicit source the core table
    /// is searched first.
    pub fn resolve(&self, field: &FieldRef) -> &Value {
        match field.source {
            Some(source) => self.get(source, &field.field),
            None => match self.get(Source::Core, &field.field) {
                Value::Missing => self.get(Source::Properties, &field.field),
                v => v,
            },
        }
    }

    pub fn has_properties(&self) -> bool {
        self.properties.is_some()
    }
}

/// Left-join `core` with `properties` on `key`, keeping core order.
///
/// Every core row appears exactly once. When the properties table repeats a
/// key the first row wins and the duplicate is logged. A join that yields no
/// rows at all is [`ReportError::EmptyResult`].
pub fn left_join(core: &Table, properties: &Table, key: &str) -> Result<Vec<MergedRow>, ReportError> {
    for table in [core, properties] {
        if !table.has_column(key) {
            return Err(ReportError::DataSourceMissing(format!(
                "key column `{key}` in table `{}`",
                table.name()
            )));
        }
    }

    let mut by_key: HashMap<String, Record> = HashMap::with_capacity(properties.len());
    for record in properties.records() {
        let Some(k) = record.get(key).and_then(Value::key) else {
            continue;
        };
        if by_key.contains_key(&k) {
            log::warn!(
                "duplicate key {k} in `{}`; keeping the first row",
                properties.name()
            );
            continue;
        }
        by_key.insert(k, record);
    }

    let rows: Vec<MergedRow> = core
        .records()
        .map(|record| {
            let k = record.get(key).and_then(Value::key);
            let properties = k.as_ref().and_then(|k| by_key.get(k)).cloned();
            MergedRow {
                key: k,
                core: record,
                properties,
            }
        })
        .collect();

    if rows.is_empty() {
        return Err(ReportError::EmptyResult {
            core: core.name().to_string(),
            properties: properties.name().to_string(),
        });
    }

    let matched = rows.iter().filter(|r| r.has_properties()).count();
    log::info!(
        "merged {} compounds ({matched} with properties)",
        rows.len()
    );
    Ok(rows)
}

/// Bounded, reproducible row sampling for test exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleOptions {
    pub size: usize,
    pub seed: u64,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self { size: 5, seed: 42 }
    }
}

/// Pick `options.size` rows with a seeded RNG. The picked rows keep their
/// merge order. When there are not more rows than the sample size, every
/// row is kept.
pub fn sample_rows(rows: Vec<MergedRow>, options: SampleOptions) -> Vec<MergedRow> {
    if rows.len() <= options.size {
        log::warn!(
            "only {} compounds available; exporting all of them",
            rows.len()
        );
        return rows;
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut picked = rand::seq::index::sample(&mut rng, rows.len(), options.size).into_vec();
    picked.sort_unstable();
    log::info!(
        "sampling {} of {} compounds (seed {})",
        options.size,
        rows.len(),
        options.seed
    );

    let mut rows: Vec<Option<MergedRow>> = rows.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|i| rows[i].take())
        .collect()
}
