use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemKind {
    Appointment,
    Event,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Appointment, ItemKind::Event];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Appointment => "appointment",
            ItemKind::Event => "event",
        }
    }

    /// Title line used on raised alerts.
    pub fn alert_title(self) -> &'static str {
        match self {
            ItemKind::Appointment => "Appointment",
            ItemKind::Event => "Event",
        }
    }

    /// REST collection name on the agenda backend.
    pub fn collection(self) -> &'static str {
        match self {
            ItemKind::Appointment => "citas",
            ItemKind::Event => "eventos",
        }
    }

    pub fn schedule_key(self) -> String {
        format!("{}.schedule", self.as_str())
    }

    pub fn muted_key(self) -> String {
        format!("{}.muted", self.as_str())
    }

    pub fn dedupe_tag(self, id: &str) -> String {
        format!("{}-{}", self.as_str(), id)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemKind {
    type Err = ParseItemKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "appointment" | "appointments" | "cita" | "citas" => Ok(ItemKind::Appointment),
            "event" | "events" | "evento" | "eventos" => Ok(ItemKind::Event),
            _ => Err(ParseItemKindError {
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for ItemKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ItemKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ItemKind::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseItemKindError {
    value: String,
}

impl fmt::Display for ParseItemKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid item kind '{}': expected one of {}",
            self.value,
            ItemKind::ALL
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Error for ParseItemKindError {}

#[cfg(test)]
mod tests {
    use super::ItemKind;
    use std::str::FromStr;

    #[test]
    fn parses_kind_names_and_backend_collections() {
        assert_eq!(
            ItemKind::from_str("appointment").unwrap(),
            ItemKind::Appointment
        );
        assert_eq!(ItemKind::from_str("Citas").unwrap(), ItemKind::Appointment);
        assert_eq!(ItemKind::from_str(" eventos ").unwrap(), ItemKind::Event);
        assert!(ItemKind::from_str("task").is_err());
    }

    #[test]
    fn storage_keys_are_separated_per_kind() {
        assert_eq!(ItemKind::Appointment.schedule_key(), "appointment.schedule");
        assert_eq!(ItemKind::Event.muted_key(), "event.muted");
        assert_ne!(
            ItemKind::Appointment.schedule_key(),
            ItemKind::Event.schedule_key()
        );
    }

    #[test]
    fn dedupe_tag_includes_kind_and_id() {
        assert_eq!(ItemKind::Event.dedupe_tag("7"), "event-7");
    }
}
