//! Sample report templates for testing and demonstration.
//!
//! Each template exercises a different mix of column kinds.

/// Reagent table: name, structure image with molecular weight in the band,
/// purpose placeholder, remarks and a computed hazard summary.
pub fn default_template() -> &'static str {
    r#"{
  "columns": [
    { "type": "text", "header": "Chemical Name", "source": "core", "field": "name" },
    {
      "type": "composite",
      "header": "Structure and MW (g/mol)",
      "components": [
        { "type": "image", "field": "image_path" },
        { "type": "text", "source": "core", "field": "molecular_weight", "prefix": "MW: " }
      ],
      "text_position": "bottom"
    },
    { "type": "blank", "header": "Purpose" },
    { "type": "computed", "header": "Remarks", "function": "physical_remarks" },
    { "type": "computed", "header": "Hazards", "function": "generate_hazards_summary" }
  ]
}"#
}

/// Lab-course layout: formula, structure with name on top, summarised uses
/// and the GHS hazard statements as bullets.
pub fn clemson_template() -> &'static str {
    r#"{
  "columns": [
    { "type": "computed", "header": "Chemical Formula", "function": "chemical_formula" },
    {
      "type": "composite",
      "header": "Structure",
      "components": [
        { "type": "text", "source": "core", "field": "name" },
        { "type": "image", "field": "image_path" },
        { "type": "text", "source": "core", "field": "molecular_weight", "prefix": "MW: " }
      ],
      "text_position": "top"
    },
    { "type": "text", "header": "Uses", "source": "properties", "field": "Uses", "summarize": true },
    { "type": "text", "header": "Hazards", "source": "properties", "field": "GHS Hazard Statements" },
    { "type": "blank" }
  ]
}"#
}

/// Minimal template for unit testing.
pub fn minimal_template() -> &'static str {
    r#"{"columns": [{"type": "text", "header": "Name", "source": "core", "field": "name"}]}"#
}
