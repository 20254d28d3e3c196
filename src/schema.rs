//! Template schema – the column layout of a report.
//!
//! A template is a JSON object with a `columns` array. Each entry is parsed
//! loosely into a [`RawColumn`] and then validated into a typed [`Column`],
//! so structural mistakes are rejected at load time with the index of the
//! offending column instead of surfacing deep inside rendering.
//!
//! ```json
//! { "columns": [
//!     { "type": "text", "header": "Name", "source": "core", "field": "name" },
//!     { "type": "composite", "header": "Structure",
//!       "components": [
//!         { "type": "image", "field": "image_path" },
//!         { "type": "text", "source": "core", "field": "molecular_weight", "prefix": "MW: " }
//!       ],
//!       "text_position": "bottom" },
//!     { "type": "computed", "header": "Hazards", "function": "generate_hazards_summary" },
//!     { "type": "blank" }
//! ] }
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, SchemaError};
use crate::functions::FunctionRegistry;

/// Which input table a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Core,
    Properties,
}

impl Source {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Some(Source::Core),
            "properties" => Some(Source::Properties),
            _ => None,
        }
    }
}

/// Where a composite's text band is drawn relative to the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Bottom,
}

/// A validated column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Text {
        header: String,
        source: Source,
        field: String,
        summarize: bool,
    },
    Image {
        header: String,
        source: Source,
        field: String,
    },
    Blank {
        header: String,
    },
    Composite {
        header: String,
        /// Text components in template order.
        texts: Vec<TextComponent>,
        /// The component supplying the base image path, if any.
        image: Option<FieldRef>,
        text_position: TextPosition,
    },
    Computed {
        header: String,
        function: String,
    },
}

impl Column {
    pub fn header(&self) -> &str {
        match self {
            Column::Text { header, .. }
            | Column::Image { header, .. }
            | Column::Blank { header }
            | Column::Composite { header, .. }
            | Column::Computed { header, .. } => header,
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Text { .. } => ColumnKind::Text,
            Column::Image { .. } => ColumnKind::Image,
            Column::Blank { .. } => ColumnKind::Blank,
            Column::Composite { .. } => ColumnKind::Composite,
            Column::Computed { .. } => ColumnKind::Computed,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Column::Composite { .. })
    }
}

/// The five recognised column kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Image,
    Blank,
    Composite,
    Computed,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Image => "image",
            ColumnKind::Blank => "blank",
            ColumnKind::Composite => "composite",
            ColumnKind::Computed => "computed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ColumnKind::Text),
            "image" => Some(ColumnKind::Image),
            "blank" => Some(ColumnKind::Blank),
            "composite" => Some(ColumnKind::Composite),
            "computed" => Some(ColumnKind::Computed),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field reference. `source: None` looks the field up in the core table
/// first, then in the properties table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub source: Option<Source>,
    pub field: String,
}

/// A text component of a composite column.
#[derive(Debug, Clone, PartialEq)]
pub struct TextComponent {
    pub field: FieldRef,
    pub prefix: String,
    pub summarize: bool,
}

/// A validated template.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    /// Parse and validate a template document.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema =
            serde_json::from_str(json).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        validate(&raw)
    }

    /// Read, parse and validate a template file.
    pub fn from_file(path: &Path) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::DataSourceMissing(format!(
                "template '{}'",
                path.display()
            )));
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Check every computed column against the registry. Unknown routines
    /// are logged; with `strict` the first one is an error.
    pub fn check_functions(
        &self,
        registry: &FunctionRegistry,
        strict: bool,
    ) -> Result<(), SchemaError> {
        for (index, column) in self.columns.iter().enumerate() {
            let Column::Computed { function, .. } = column else {
                continue;
            };
            if registry.contains(function) {
                continue;
            }
            if strict {
                return Err(SchemaError::UnregisteredFunction {
                    index,
                    function: function.clone(),
                });
            }
            log::warn!(
                "column {index}: no computed routine named {function:?}; cells will be empty"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw document
// ---------------------------------------------------------------------------

/// The template as written on disk, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSchema {
    pub columns: Vec<RawColumn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawColumn {
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub summarize: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<RawComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_position: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawComponent {
    #[serde(rename = "type", alias = "kind", default)]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub summarize: bool,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a raw template into a [`Schema`].
pub fn validate(raw: &RawSchema) -> Result<Schema, SchemaError> {
    let columns = raw
        .columns
        .iter()
        .enumerate()
        .map(|(index, col)| validate_column(index, col))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Schema { columns })
}

fn validate_column(index: usize, col: &RawColumn) -> Result<Column, SchemaError> {
    let kind_name = col.kind.as_deref().unwrap_or_default();
    let kind = ColumnKind::parse(kind_name).ok_or_else(|| SchemaError::UnknownKind {
        index,
        kind: kind_name.to_string(),
    })?;
    let header = col.header.clone().unwrap_or_default();

    let required = |value: &Option<String>, field: &'static str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(SchemaError::MissingField {
                index,
                kind: kind.as_str(),
                field,
            })
    };
    let source = |value: &str| {
        Source::parse(value).ok_or_else(|| SchemaError::UnknownSource {
            index,
            source_name: value.to_string(),
        })
    };

    let column = match kind {
        ColumnKind::Blank => Column::Blank { header },
        ColumnKind::Text => Column::Text {
            source: source(&required(&col.source, "source")?)?,
            field: required(&col.field, "field")?,
            summarize: col.summarize,
            header,
        },
        ColumnKind::Image => Column::Image {
            source: source(&required(&col.source, "source")?)?,
            field: required(&col.field, "field")?,
            header,
        },
        ColumnKind::Computed => Column::Computed {
            function: required(&col.function, "function")?,
            header,
        },
        ColumnKind::Composite => {
            if col.components.is_empty() {
                return Err(SchemaError::EmptyComposite { index });
            }
            let mut texts = Vec::new();
            let mut images = Vec::new();
            for (component, raw) in col.components.iter().enumerate() {
                let field = raw
                    .field
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .ok_or(SchemaError::ComponentMissingField { index, component })?;
                let field = FieldRef {
                    source: raw.source.as_deref().map(source).transpose()?,
                    field: field.to_string(),
                };
                match raw.kind.as_deref() {
                    Some("text") => texts.push(TextComponent {
                        field,
                        prefix: raw.prefix.clone().unwrap_or_default(),
                        summarize: raw.summarize,
                    }),
                    Some("image") => images.push(field),
                    other => {
                        return Err(SchemaError::UnknownComponentKind {
                            index,
                            component,
                            kind: other.unwrap_or_default().to_string(),
                        })
                    }
                }
            }
            if images.len() > 1 {
                return Err(SchemaError::ImageComponentCount {
                    index,
                    count: images.len(),
                });
            }
            let text_position = match col.text_position.as_deref().map(str::trim) {
                None | Some("") | Some("bottom") => TextPosition::Bottom,
                Some("top") => TextPosition::Top,
                Some(other) => {
                    return Err(SchemaError::UnknownTextPosition {
                        index,
                        position: other.to_string(),
                    })
                }
            };
            Column::Composite {
                header,
                texts,
                image: images.pop(),
                text_position,
            }
        }
    };
    Ok(column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates;

    #[test]
    fn bundled_templates_validate() {
        for (name, json) in [
            ("default", templates::default_template()),
            ("clemson", templates::clemson_template()),
        ] {
            let schema = Schema::from_json(json);
            assert!(schema.is_ok(), "{name}: {:?}", schema.err());
        }
    }

    #[test]
    fn unknown_kind_names_index_and_kind() {
        let json = r#"{"columns": [{"type": "blank"}, {"type": "chart", "header": "X"}]}"#;
        let err = Schema::from_json(json).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownKind {
                index: 1,
                kind: "chart".to_string()
            }
        );
    }

    #[test]
    fn kind_alias_is_accepted() {
        let json = r#"{"columns": [{"kind": "computed", "header": "H", "function": "f"}]}"#;
        let schema = Schema::from_json(json).unwrap();
        assert_eq!(schema.columns[0].kind(), ColumnKind::Computed);
    }

    #[test]
    fn text_column_requires_field_and_source() {
        let json = r#"{"columns": [{"type": "text", "header": "Name", "field": "name"}]}"#;
        assert_eq!(
            Schema::from_json(json).unwrap_err(),
            SchemaError::MissingField {
                index: 0,
                kind: "text",
                field: "source"
            }
        );

        let json = r#"{"columns": [{"type": "image", "header": "Img", "source": "core"}]}"#;
        assert!(matches!(
            Schema::from_json(json).unwrap_err(),
            SchemaError::MissingField { field: "field", .. }
        ));
    }

    #[test]
    fn composite_rules() {
        let empty = r#"{"columns": [{"type": "composite", "header": "C", "components": []}]}"#;
        assert_eq!(
            Schema::from_json(empty).unwrap_err(),
            SchemaError::EmptyComposite { index: 0 }
        );

        let two_images = r#"{"columns": [{"type": "composite", "header": "C", "components": [
            {"type": "image", "field": "a"}, {"type": "image", "field": "b"}]}]}"#;
        assert_eq!(
            Schema::from_json(two_images).unwrap_err(),
            SchemaError::ImageComponentCount { index: 0, count: 2 }
        );

        let ok = r#"{"columns": [{"type": "composite", "header": "C", "text_position": "top",
            "components": [{"type": "text", "source": "properties", "field": "Density", "prefix": "d: "},
                           {"type": "image", "field": "image_path"}]}]}"#;
        let schema = Schema::from_json(ok).unwrap();
        let Column::Composite {
            texts,
            image,
            text_position,
            ..
        } = &schema.columns[0]
        else {
            panic!("expected composite");
        };
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].prefix, "d: ");
        assert_eq!(texts[0].field.source, Some(Source::Properties));
        assert_eq!(image.as_ref().unwrap().field, "image_path");
        assert_eq!(image.as_ref().unwrap().source, None);
        assert_eq!(*text_position, TextPosition::Top);
    }

    #[test]
    fn bad_source_and_position_are_rejected() {
        let json = r#"{"columns": [{"type": "text", "header": "N", "source": "web", "field": "n"}]}"#;
        assert!(matches!(
            Schema::from_json(json).unwrap_err(),
            SchemaError::UnknownSource { index: 0, .. }
        ));

        let json = r#"{"columns": [{"type": "composite", "header": "C", "text_position": "left",
            "components": [{"type": "text", "field": "name"}]}]}"#;
        assert!(matches!(
            Schema::from_json(json).unwrap_err(),
            SchemaError::UnknownTextPosition { index: 0, .. }
        ));
    }

    #[test]
    fn malformed_document() {
        assert!(matches!(
            Schema::from_json("{\"columns\": 3}"),
            Err(SchemaError::Malformed(_))
        ));
    }

    #[test]
    fn unregistered_function_is_flagged_only_when_strict() {
        let json = r#"{"columns": [{"type": "computed", "header": "H", "function": "nope"}]}"#;
        let schema = Schema::from_json(json).unwrap();
        let registry = FunctionRegistry::builtin();
        assert!(schema.check_functions(&registry, false).is_ok());
        assert_eq!(
            schema.check_functions(&registry, true).unwrap_err(),
            SchemaError::UnregisteredFunction {
                index: 0,
                function: "nope".to_string()
            }
        );
    }
}
