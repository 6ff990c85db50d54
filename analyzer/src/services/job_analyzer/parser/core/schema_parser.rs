//! Schema string parser
//!
//! Operator inputs and outputs carry schemas like `"UserId:long,Query:string?"`.
//! The nullability marker may appear on either the name or the type.

use crate::services::job_analyzer::models::SchemaField;

pub struct SchemaParser;

impl SchemaParser {
    /// Parse a raw schema string into ordered fields
    ///
    /// Never fails: a field without a `:` keeps its name and an empty type.
    pub fn parse(schema: &str) -> Vec<SchemaField> {
        schema
            .split(',')
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(Self::parse_field)
            .collect()
    }

    fn parse_field(raw: &str) -> SchemaField {
        let (name_part, type_part) = raw.split_once(':').unwrap_or((raw, ""));
        let (name, name_nullable) = Self::strip_nullable(name_part);
        let (field_type, type_nullable) = Self::strip_nullable(type_part);

        SchemaField {
            name: name.to_string(),
            field_type: field_type.to_string(),
            is_nullable: name_nullable || type_nullable,
        }
    }

    fn strip_nullable(token: &str) -> (&str, bool) {
        let token = token.trim();
        match token.strip_suffix('?') {
            Some(stripped) => (stripped.trim_end(), true),
            None => (token, false),
        }
    }
}
