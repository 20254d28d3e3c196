//! Computed-column routines.
//!
//! A `computed` column names a routine; the registry maps names to plain
//! functions over a merged row. The set is closed at startup but callers may
//! [`register`](FunctionRegistry::register) their own before rendering.

use std::collections::BTreeMap;

use crate::merge::MergedRow;
use crate::table::Value;
use crate::text::{reflow, token_count, TextRules};

/// A computed routine. Returns `None` when the row has nothing to show.
pub type ComputedFn = fn(&MergedRow, &TextRules) -> Option<String>;

/// Hazard-related property names gathered by `generate_hazards_summary`, in
/// output order.
pub const HAZARD_SUMMARY_FIELDS: [&str; 6] = [
    "Other Safety Information",
    "Corrosivity",
    "Fire Fighting",
    "Exposure Control and Personal Protection",
    "First Aid Measures",
    "Accidental Release Measures",
];

/// Name → routine mapping consulted by `computed` columns.
#[derive(Clone)]
pub struct FunctionRegistry {
    routines: BTreeMap<String, ComputedFn>,
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            routines: BTreeMap::new(),
        }
    }

    /// The registry with every bundled routine.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("generate_hazards_summary", hazards_summary);
        registry.register("chemical_formula", chemical_formula);
        registry.register("physical_remarks", physical_remarks);
        registry
    }

    pub fn register(&mut self, name: &str, routine: ComputedFn) {
        self.routines.insert(name.to_string(), routine);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routines.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ComputedFn> {
        self.routines.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.routines.keys().map(String::as_str)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.routines.keys()).finish()
    }
}

/// `"<Field>: <value>"` for each present hazard field, one per line. Past the
/// summarise threshold the whole block is re-flowed at the wrap width.
pub fn hazards_summary(row: &MergedRow, rules: &TextRules) -> Option<String> {
    let parts: Vec<String> = HAZARD_SUMMARY_FIELDS
        .iter()
        .filter_map(|field| {
            row.lookup(field)
                .non_blank()
                .map(|v| format!("{field}: {v}"))
        })
        .collect();
    if parts.is_empty() {
        return None;
    }

    let summary = parts.join("\n");
    if token_count(&summary) > rules.summarize_threshold {
        Some(reflow(&summary, rules.wrap_width))
    } else {
        Some(summary)
    }
}

/// `"<name> (<formula>)"` with the formula's digits as Unicode subscripts.
pub fn chemical_formula(row: &MergedRow, _rules: &TextRules) -> Option<String> {
    let formula = row.lookup("formula").non_blank().map(|f| subscript_digits(&f));
    let name = row.lookup("name").non_blank();
    match (name, formula) {
        (Some(name), Some(formula)) => Some(format!("{name} ({formula})")),
        (Some(name), None) => Some(name.into_owned()),
        (None, formula) => formula,
    }
}

/// Short physical-property remarks, one per line.
pub fn physical_remarks(row: &MergedRow, _rules: &TextRules) -> Option<String> {
    const REMARKS: [(&str, &str, &str); 4] = [
        ("form", "Form - ", ""),
        ("melting_point", "MP - ", " °C"),
        ("boiling_point", "BP - ", " °C"),
        ("density", "Density - ", " g/ml"),
    ];
    let lines: Vec<String> = REMARKS
        .iter()
        .filter_map(|(field, label, unit)| {
            let value: &Value = row.lookup(field);
            value.non_blank().map(|v| format!("{label}{v}{unit}"))
        })
        .collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}

/// Replace ASCII digits with their Unicode subscript forms (`H2O` → `H₂O`).
pub fn subscript_digits(formula: &str) -> String {
    formula
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x2080 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}
