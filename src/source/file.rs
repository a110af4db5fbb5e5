use std::path::PathBuf;

use crate::domain::item::SchedulableItem;
use crate::domain::status::ItemStatus;

use super::{ItemSource, SourceError, StatusWriter};

/// Items kept in a local JSON array file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read_all(&self) -> Result<Vec<SchedulableItem>, SourceError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl ItemSource for JsonFileSource {
    fn fetch_eligible_items(&self) -> Result<Vec<SchedulableItem>, SourceError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|item| item.status.is_eligible())
            .collect())
    }
}

impl StatusWriter for JsonFileSource {
    fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), SourceError> {
        let mut items = self.read_all()?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| SourceError::UnknownItem(id.to_string()))?;
        item.status = status;
        let encoded = serde_json::to_string_pretty(&items)?;
        std::fs::write(&self.path, format!("{encoded}\n"))?;
        Ok(())
    }
}
