use crate::property::Property;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sysfs read failed: {path}: {source}")]
    SysfsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("sysfs write failed: {path}: {source}")]
    SysfsWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse error for {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("{supply}: property {property:?} not supported")]
    Unsupported { supply: String, property: Property },

    #[error("power supply not found: {0}")]
    SupplyNotFound(String),

    #[error("invalid value for {what}: {value}")]
    InvalidValue { what: &'static str, value: i64 },

    #[error("config error: {0}")]
    Config(String),

    #[error("scenario error: {0}")]
    Scenario(String),

    #[error("not running as root (required for {operation})")]
    NotRoot { operation: String },
}

pub type Result<T> = std::result::Result<T, Error>;
