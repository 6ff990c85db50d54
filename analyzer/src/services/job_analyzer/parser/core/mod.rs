//! Core parsing components for job telemetry documents

pub mod schema_parser;
pub mod value_parser;
pub mod xml_decoder;

pub use schema_parser::SchemaParser;
pub use value_parser::ValueParser;
pub use xml_decoder::{XmlDecoder, XmlElement};
