use std::collections::BTreeMap;

use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::domain::item::SchedulableItem;
use crate::domain::schedule::{ScheduleBasis, ScheduleMode, ScheduleState, Step};

pub type ScheduleMap = BTreeMap<String, ScheduleState>;

pub const DEFAULT_WINDOW_MINUTES: i64 = 120;
pub const DEFAULT_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerSettings {
    /// Assumed duration of items that carry no end instant.
    pub default_window: Duration,
    /// Extra time after the end during which the item may still fire.
    pub grace: Duration,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            default_window: Duration::minutes(DEFAULT_WINDOW_MINUTES),
            grace: Duration::minutes(DEFAULT_GRACE_MINUTES),
        }
    }
}

impl PlannerSettings {
    pub fn expires_at(&self, item: &SchedulableItem) -> OffsetDateTime {
        let end = item
            .end_at
            .unwrap_or_else(|| item.start_at.saturating_add(self.default_window));
        end.saturating_add(self.grace)
    }
}

/// Recomputes schedule state for the current item list.
///
/// Ineligible, invalid and absent items lose their state. Calling this twice
/// with the same inputs and the same `now` yields the same map.
pub fn reconcile(
    items: &[SchedulableItem],
    now: OffsetDateTime,
    prior: &ScheduleMap,
    settings: &PlannerSettings,
) -> ScheduleMap {
    let mut next = ScheduleMap::new();
    for item in items {
        if !item.status.is_eligible() {
            continue;
        }
        if let Err(err) = item.validate() {
            warn!(error = %err, "excluding invalid item from scheduling");
            continue;
        }
        if next.contains_key(&item.id) {
            warn!(item_id = %item.id, "duplicate item id in source list, keeping the first");
            continue;
        }
        let state = plan_item(item, now, prior.get(&item.id), settings);
        next.insert(item.id.clone(), state);
    }

    let dropped = prior.keys().filter(|id| !next.contains_key(*id)).count();
    debug!(tracked = next.len(), dropped, "reconciled schedule");
    next
}

pub fn plan_item(
    item: &SchedulableItem,
    now: OffsetDateTime,
    prior: Option<&ScheduleState>,
    settings: &PlannerSettings,
) -> ScheduleState {
    let mut state = match prior {
        Some(existing) if !existing.basis.is_edited_by(item) => {
            rederive(existing, item, now, settings)
        }
        _ => initial_state(item, now, settings),
    };
    if now > state.expires_at {
        state.next_fire_at = None;
    }
    state
}

fn initial_state(
    item: &SchedulableItem,
    now: OffsetDateTime,
    settings: &PlannerSettings,
) -> ScheduleState {
    let mode = ScheduleMode::classify(item.lead_minutes, item.repeat_minutes);
    let lead_at = item.lead_at();
    let (step, next_fire_at) = match mode {
        ScheduleMode::Single => (None, Some(item.start_at)),
        ScheduleMode::TwoStep => {
            let step = initial_step(item, now);
            let next = match step {
                Step::Lead => Some(lead_at),
                Step::Start if now <= item.start_at => Some(item.start_at),
                Step::Start => None,
            };
            (Some(step), next)
        }
        ScheduleMode::Repeating => (None, Some(lead_at.max(now))),
    };

    ScheduleState {
        mode,
        step,
        next_fire_at,
        last_fired_at: None,
        expires_at: settings.expires_at(item),
        basis: ScheduleBasis::of(item),
    }
}

fn initial_step(item: &SchedulableItem, now: OffsetDateTime) -> Step {
    if now <= item.lead_at() {
        Step::Lead
    } else {
        Step::Start
    }
}

// Keeps fire progress and lifts next_fire_at to the mode's floor. An exhausted
// schedule stays exhausted.
fn rederive(
    existing: &ScheduleState,
    item: &SchedulableItem,
    now: OffsetDateTime,
    settings: &PlannerSettings,
) -> ScheduleState {
    let mode = ScheduleMode::classify(item.lead_minutes, item.repeat_minutes);
    let lead_at = item.lead_at();
    let mut step = existing.step;

    let next_fire_at = match (mode, existing.next_fire_at) {
        (_, None) => None,
        (ScheduleMode::Single, Some(next)) => Some(next.max(item.start_at)),
        (ScheduleMode::TwoStep, Some(next)) => {
            let current = *step.get_or_insert_with(|| initial_step(item, now));
            match current {
                Step::Lead => Some(lead_at),
                Step::Start => Some(next.max(item.start_at)),
            }
        }
        (ScheduleMode::Repeating, Some(next)) => Some(next.max(lead_at)),
    };
    if mode != ScheduleMode::TwoStep {
        step = None;
    }

    ScheduleState {
        mode,
        step,
        next_fire_at,
        last_fired_at: existing.last_fired_at,
        expires_at: settings.expires_at(item),
        basis: ScheduleBasis::of(item),
    }
}

/// Moves a schedule past a fire that happened at `now`.
pub fn advance_after_fire(state: &mut ScheduleState, now: OffsetDateTime) {
    state.last_fired_at = Some(now);
    state.next_fire_at = match state.mode {
        ScheduleMode::Single => None,
        ScheduleMode::TwoStep => match state.step {
            Some(Step::Lead) => {
                state.step = Some(Step::Start);
                Some(state.basis.start_at)
            }
            _ => None,
        },
        ScheduleMode::Repeating => {
            let candidate = now.saturating_add(Duration::minutes(state.basis.repeat_minutes));
            if candidate <= state.expires_at {
                Some(candidate)
            } else if now < state.expires_at {
                Some(state.expires_at)
            } else {
                None
            }
        }
    };
}

#[cfg(test)]
#[path = "planner_tests_ext.rs"]
mod tests_ext;
