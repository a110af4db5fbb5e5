use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::status::ItemStatus;

/// Upper bound for lead and repeat offsets: one year of minutes.
pub const MAX_OFFSET_MINUTES: i64 = 366 * 24 * 60;

/// A time-bound agenda entry as reported by the item source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulableItem {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub lead_minutes: i64,
    #[serde(default)]
    pub repeat_minutes: i64,
    pub status: ItemStatus,
}

impl SchedulableItem {
    pub fn validate(&self) -> Result<(), InvalidItem> {
        let reason = if self.id.trim().is_empty() {
            Some(InvalidItemReason::EmptyId)
        } else if !(0..=MAX_OFFSET_MINUTES).contains(&self.lead_minutes) {
            Some(InvalidItemReason::LeadOutOfRange(self.lead_minutes))
        } else if !(0..=MAX_OFFSET_MINUTES).contains(&self.repeat_minutes) {
            Some(InvalidItemReason::RepeatOutOfRange(self.repeat_minutes))
        } else if self.end_at.is_some_and(|end| end < self.start_at) {
            Some(InvalidItemReason::EndBeforeStart)
        } else if self
            .start_at
            .checked_sub(Duration::minutes(self.lead_minutes))
            .is_none()
        {
            Some(InvalidItemReason::StartOutOfRange)
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidItem {
                id: self.id.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Instant of the advance notice. Equal to `start_at` when there is no lead time.
    pub fn lead_at(&self) -> OffsetDateTime {
        self.start_at
            .checked_sub(Duration::minutes(self.lead_minutes))
            .unwrap_or(self.start_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidItemReason {
    EmptyId,
    LeadOutOfRange(i64),
    RepeatOutOfRange(i64),
    EndBeforeStart,
    StartOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidItem {
    pub id: String,
    pub reason: InvalidItemReason,
}

impl fmt::Display for InvalidItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            InvalidItemReason::EmptyId => write!(f, "item has an empty id"),
            InvalidItemReason::LeadOutOfRange(value) => write!(
                f,
                "item '{}' has lead minutes {} outside 0..={}",
                self.id, value, MAX_OFFSET_MINUTES
            ),
            InvalidItemReason::RepeatOutOfRange(value) => write!(
                f,
                "item '{}' has repeat minutes {} outside 0..={}",
                self.id, value, MAX_OFFSET_MINUTES
            ),
            InvalidItemReason::EndBeforeStart => {
                write!(f, "item '{}' ends before it starts", self.id)
            }
            InvalidItemReason::StartOutOfRange => {
                write!(f, "item '{}' has a start instant out of range", self.id)
            }
        }
    }
}

impl Error for InvalidItem {}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{InvalidItemReason, SchedulableItem};
    use crate::domain::status::ItemStatus;

    fn item() -> SchedulableItem {
        SchedulableItem {
            id: "42".to_string(),
            title: "Dentist".to_string(),
            start_at: datetime!(2025-01-10 10:00 UTC),
            end_at: None,
            lead_minutes: 15,
            repeat_minutes: 0,
            status: ItemStatus::Pending,
        }
    }

    #[test]
    fn lead_at_subtracts_lead_minutes() {
        assert_eq!(item().lead_at(), datetime!(2025-01-10 09:45 UTC));
    }

    #[test]
    fn rejects_negative_offsets() {
        let mut bad = item();
        bad.lead_minutes = -5;
        let err = bad.validate().expect_err("negative lead should be rejected");
        assert_eq!(err.reason, InvalidItemReason::LeadOutOfRange(-5));

        let mut bad = item();
        bad.repeat_minutes = -1;
        let err = bad.validate().expect_err("negative repeat should be rejected");
        assert!(err.to_string().contains("repeat minutes -1"));
    }

    #[test]
    fn rejects_end_before_start_and_empty_id() {
        let mut bad = item();
        bad.end_at = Some(datetime!(2025-01-10 09:00 UTC));
        assert_eq!(
            bad.validate().unwrap_err().reason,
            InvalidItemReason::EndBeforeStart
        );

        let mut bad = item();
        bad.id = "  ".to_string();
        assert_eq!(bad.validate().unwrap_err().reason, InvalidItemReason::EmptyId);
    }

    #[test]
    fn deserializes_from_json_with_defaults_and_backend_status() {
        let raw = r#"{"id":"7","start_at":"2025-01-10T10:00:00Z","status":"Activo"}"#;
        let parsed: SchedulableItem = serde_json::from_str(raw).expect("item should parse");
        assert_eq!(parsed.lead_minutes, 0);
        assert_eq!(parsed.repeat_minutes, 0);
        assert_eq!(parsed.end_at, None);
        assert_eq!(parsed.status, ItemStatus::Active);
        assert!(parsed.validate().is_ok());
    }
}
