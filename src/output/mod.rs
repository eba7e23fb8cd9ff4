pub mod json;
pub mod plain;

pub use json::{output_json, output_json_line, save_json};
pub use plain::{output_interval, output_plain};
