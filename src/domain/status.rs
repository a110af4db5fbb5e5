use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemStatus {
    Pending,
    Active,
    Archived,
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 4] = [
        ItemStatus::Pending,
        ItemStatus::Active,
        ItemStatus::Archived,
        ItemStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Active => "active",
            ItemStatus::Archived => "archived",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// Status tag as stored by the agenda backend.
    pub fn backend_tag(self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pendiente",
            ItemStatus::Active => "Activo",
            ItemStatus::Archived => "Archivado",
            ItemStatus::Cancelled => "Cancelado",
        }
    }

    pub fn is_eligible(self) -> bool {
        matches!(self, ItemStatus::Pending | ItemStatus::Active)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = ParseItemStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let status = match normalized.as_str() {
            "pending" | "pendiente" => ItemStatus::Pending,
            "active" | "activo" | "activa" => ItemStatus::Active,
            "archived" | "archivado" | "archivada" => ItemStatus::Archived,
            "cancelled" | "canceled" | "cancelado" | "cancelada" => ItemStatus::Cancelled,
            _ => {
                return Err(ParseItemStatusError {
                    value: value.to_string(),
                });
            }
        };

        Ok(status)
    }
}

impl Serialize for ItemStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ItemStatus::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseItemStatusError {
    value: String,
}

impl fmt::Display for ParseItemStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid item status '{}': expected one of {}",
            self.value,
            ItemStatus::ALL
                .iter()
                .map(|status| status.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseItemStatusError {}

#[cfg(test)]
mod tests {
    use super::ItemStatus;
    use std::str::FromStr;

    #[test]
    fn parses_english_names_and_backend_tags() {
        assert_eq!(
            ItemStatus::from_str("pending").unwrap(),
            ItemStatus::Pending
        );
        assert_eq!(
            ItemStatus::from_str("Pendiente").unwrap(),
            ItemStatus::Pending
        );
        assert_eq!(ItemStatus::from_str("ACTIVO").unwrap(), ItemStatus::Active);
        assert_eq!(
            ItemStatus::from_str("canceled").unwrap(),
            ItemStatus::Cancelled
        );
    }

    #[test]
    fn only_pending_and_active_are_eligible() {
        let eligible = ItemStatus::ALL
            .iter()
            .filter(|status| status.is_eligible())
            .count();
        assert_eq!(eligible, 2);
        assert!(!ItemStatus::Archived.is_eligible());
        assert!(!ItemStatus::Cancelled.is_eligible());
    }

    #[test]
    fn backend_tags_round_trip_through_parser() {
        for status in ItemStatus::ALL {
            assert_eq!(ItemStatus::from_str(status.backend_tag()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_error_lists_expected_values() {
        let err = ItemStatus::from_str("done").expect_err("unknown status should fail");
        let message = err.to_string();
        assert!(message.contains("'done'"));
        assert!(message.contains("pending, active, archived, cancelled"));
    }
}
