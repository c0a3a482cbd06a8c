pub mod exporter;
pub mod ndjson;
