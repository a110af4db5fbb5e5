mod file;
mod http;
mod rows;
#[cfg(test)]
mod tests;

use std::error::Error;
use std::fmt;

use crate::domain::item::SchedulableItem;
use crate::domain::status::ItemStatus;

pub use file::JsonFileSource;
pub use http::HttpBackend;

/// Supplies the current list of schedulable items.
pub trait ItemSource {
    fn fetch_eligible_items(&self) -> Result<Vec<SchedulableItem>, SourceError>;
}

/// Changes an item's lifecycle status at the source.
pub trait StatusWriter {
    fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), SourceError>;
}

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Http(ureq::Error),
    UnknownItem(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io(err) => write!(f, "item source I/O error: {}", err),
            SourceError::Json(err) => write!(f, "item source returned invalid JSON: {}", err),
            SourceError::Http(err) => write!(f, "item source request failed: {}", err),
            SourceError::UnknownItem(id) => write!(f, "item '{}' not found at source", id),
        }
    }
}

impl Error for SourceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SourceError::Io(err) => Some(err),
            SourceError::Json(err) => Some(err),
            SourceError::Http(err) => Some(err),
            SourceError::UnknownItem(_) => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(value: std::io::Error) -> Self {
        SourceError::Io(value)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(value: serde_json::Error) -> Self {
        SourceError::Json(value)
    }
}

impl From<ureq::Error> for SourceError {
    fn from(value: ureq::Error) -> Self {
        SourceError::Http(value)
    }
}
