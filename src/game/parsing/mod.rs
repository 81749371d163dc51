pub mod json;
pub mod renoise;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("XML parsing error: {0}")]
    Xml(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid song archive: {0}")]
    Archive(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),

    #[error("Invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Unsupported chart file '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<quick_xml::Error> for ChartError {
    fn from(err: quick_xml::Error) -> Self {
        ChartError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ChartError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ChartError::Xml(err.to_string())
    }
}

impl From<zip::result::ZipError> for ChartError {
    fn from(err: zip::result::ZipError) -> Self {
        ChartError::Archive(err.to_string())
    }
}

pub(crate) fn invalid(field: &str, value: impl ToString, expected: &str) -> ChartError {
    ChartError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}
