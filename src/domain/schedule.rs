use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::item::SchedulableItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// One fire at the start instant.
    Single,
    /// A lead-time notice, then a fire at the start instant.
    TwoStep,
    /// Fires from the lead instant every `repeat_minutes` until expiry.
    Repeating,
}

impl ScheduleMode {
    pub fn classify(lead_minutes: i64, repeat_minutes: i64) -> Self {
        if repeat_minutes > 0 {
            ScheduleMode::Repeating
        } else if lead_minutes > 0 {
            ScheduleMode::TwoStep
        } else {
            ScheduleMode::Single
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleMode::Single => "single",
            ScheduleMode::TwoStep => "two_step",
            ScheduleMode::Repeating => "repeating",
        }
    }
}

/// Which fire of a two-step schedule comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Lead,
    Start,
}

impl Step {
    pub fn number(self) -> u8 {
        match self {
            Step::Lead => 1,
            Step::Start => 2,
        }
    }
}

/// The item fields a schedule was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBasis {
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_at: Option<OffsetDateTime>,
    pub lead_minutes: i64,
    pub repeat_minutes: i64,
}

impl ScheduleBasis {
    pub fn of(item: &SchedulableItem) -> Self {
        Self {
            start_at: item.start_at,
            end_at: item.end_at,
            lead_minutes: item.lead_minutes,
            repeat_minutes: item.repeat_minutes,
        }
    }

    /// True when the item was edited in a way that invalidates fire progress.
    pub fn is_edited_by(&self, item: &SchedulableItem) -> bool {
        self.start_at != item.start_at
            || self.lead_minutes != item.lead_minutes
            || self.repeat_minutes != item.repeat_minutes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub mode: ScheduleMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// `None` means the item will not fire again.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub next_fire_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_fired_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub basis: ScheduleBasis,
}

impl ScheduleState {
    pub fn is_due(&self, now: OffsetDateTime) -> bool {
        match self.next_fire_at {
            Some(next) => next <= now && next <= self.expires_at && now <= self.expires_at,
            None => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_fire_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{ScheduleBasis, ScheduleMode, ScheduleState, Step};

    fn state(next: Option<time::OffsetDateTime>) -> ScheduleState {
        ScheduleState {
            mode: ScheduleMode::TwoStep,
            step: Some(Step::Lead),
            next_fire_at: next,
            last_fired_at: None,
            expires_at: datetime!(2025-01-10 12:05 UTC),
            basis: ScheduleBasis {
                start_at: datetime!(2025-01-10 10:00 UTC),
                end_at: None,
                lead_minutes: 15,
                repeat_minutes: 0,
            },
        }
    }

    #[test]
    fn classifies_modes_by_offsets() {
        assert_eq!(ScheduleMode::classify(0, 0), ScheduleMode::Single);
        assert_eq!(ScheduleMode::classify(15, 0), ScheduleMode::TwoStep);
        assert_eq!(ScheduleMode::classify(0, 5), ScheduleMode::Repeating);
        assert_eq!(ScheduleMode::classify(15, 5), ScheduleMode::Repeating);
    }

    #[test]
    fn due_requires_reached_fire_time_within_expiry() {
        let s = state(Some(datetime!(2025-01-10 09:45 UTC)));
        assert!(!s.is_due(datetime!(2025-01-10 09:44:59 UTC)));
        assert!(s.is_due(datetime!(2025-01-10 09:45 UTC)));
        assert!(!s.is_due(datetime!(2025-01-10 12:06 UTC)));
        assert!(!state(None).is_due(datetime!(2025-01-10 10:00 UTC)));
    }

    #[test]
    fn persisted_form_uses_rfc3339_and_null_for_never() {
        let encoded = serde_json::to_value(state(None)).expect("state should serialize");
        assert_eq!(encoded["mode"], "two_step");
        assert_eq!(encoded["step"], "lead");
        assert!(encoded["next_fire_at"].is_null());
        assert_eq!(encoded["expires_at"], "2025-01-10T12:05:00Z");
    }
}
