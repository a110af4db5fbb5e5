use time::macros::datetime;
use time::OffsetDateTime;

use super::{advance_after_fire, plan_item, reconcile, PlannerSettings, ScheduleMap};
use crate::domain::item::SchedulableItem;
use crate::domain::schedule::{ScheduleMode, Step};
use crate::domain::status::ItemStatus;

fn item(id: &str, lead: i64, repeat: i64) -> SchedulableItem {
    SchedulableItem {
        id: id.to_string(),
        title: format!("item {id}"),
        start_at: datetime!(2025-01-10 10:00 UTC),
        end_at: None,
        lead_minutes: lead,
        repeat_minutes: repeat,
        status: ItemStatus::Pending,
    }
}

fn settings() -> PlannerSettings {
    PlannerSettings::default()
}

fn plan(item: &SchedulableItem, now: OffsetDateTime) -> crate::domain::schedule::ScheduleState {
    plan_item(item, now, None, &settings())
}

#[test]
fn single_mode_starts_at_start_instant() {
    let state = plan(&item("1", 0, 0), datetime!(2025-01-10 08:00 UTC));
    assert_eq!(state.mode, ScheduleMode::Single);
    assert_eq!(state.step, None);
    assert_eq!(state.next_fire_at, Some(datetime!(2025-01-10 10:00 UTC)));
    assert_eq!(state.expires_at, datetime!(2025-01-10 12:05 UTC));
}

#[test]
fn single_mode_observed_after_expiry_never_fires() {
    let state = plan(&item("1", 0, 0), datetime!(2025-01-10 12:06 UTC));
    assert_eq!(state.next_fire_at, None);
}

#[test]
fn explicit_end_drives_expiry() {
    let mut with_end = item("1", 0, 0);
    with_end.end_at = Some(datetime!(2025-01-10 10:30 UTC));
    let state = plan(&with_end, datetime!(2025-01-10 08:00 UTC));
    assert_eq!(state.expires_at, datetime!(2025-01-10 10:35 UTC));
}

#[test]
fn two_step_initial_phase_depends_on_now() {
    let two_step = item("1", 15, 0);

    let early = plan(&two_step, datetime!(2025-01-10 09:00 UTC));
    assert_eq!(early.step, Some(Step::Lead));
    assert_eq!(early.next_fire_at, Some(datetime!(2025-01-10 09:45 UTC)));

    let between = plan(&two_step, datetime!(2025-01-10 09:50 UTC));
    assert_eq!(between.step, Some(Step::Start));
    assert_eq!(between.next_fire_at, Some(datetime!(2025-01-10 10:00 UTC)));

    let late = plan(&two_step, datetime!(2025-01-10 10:01 UTC));
    assert_eq!(late.step, Some(Step::Start));
    assert_eq!(late.next_fire_at, None);
}

#[test]
fn repeating_starts_at_lead_or_now() {
    let repeating = item("1", 30, 10);

    let early = plan(&repeating, datetime!(2025-01-10 08:00 UTC));
    assert_eq!(early.mode, ScheduleMode::Repeating);
    assert_eq!(early.next_fire_at, Some(datetime!(2025-01-10 09:30 UTC)));

    let during = plan(&repeating, datetime!(2025-01-10 10:20 UTC));
    assert_eq!(during.next_fire_at, Some(datetime!(2025-01-10 10:20 UTC)));
}

#[test]
fn reconcile_is_idempotent_without_time_advancing() {
    let items = vec![item("1", 0, 0), item("2", 15, 0), item("3", 0, 20)];
    let now = datetime!(2025-01-10 09:50 UTC);

    let first = reconcile(&items, now, &ScheduleMap::new(), &settings());
    let second = reconcile(&items, now, &first, &settings());
    let third = reconcile(&items, now, &second, &settings());

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn reconcile_drops_absent_and_ineligible_items() {
    let now = datetime!(2025-01-10 09:00 UTC);
    let items = vec![item("1", 0, 0), item("2", 0, 0), item("3", 0, 0)];
    let prior = reconcile(&items, now, &ScheduleMap::new(), &settings());
    assert_eq!(prior.len(), 3);

    let mut archived = item("2", 0, 0);
    archived.status = ItemStatus::Archived;
    let next = reconcile(&[item("1", 0, 0), archived], now, &prior, &settings());

    assert_eq!(next.keys().collect::<Vec<_>>(), vec!["1"]);
}

#[test]
fn reconcile_excludes_invalid_items_and_keeps_first_duplicate() {
    let now = datetime!(2025-01-10 09:00 UTC);
    let mut invalid = item("bad", 0, 0);
    invalid.lead_minutes = -10;
    let mut duplicate = item("1", 0, 0);
    duplicate.start_at = datetime!(2025-01-11 10:00 UTC);

    let states = reconcile(
        &[item("1", 0, 0), invalid, duplicate],
        now,
        &ScheduleMap::new(),
        &settings(),
    );

    assert_eq!(states.len(), 1);
    assert_eq!(
        states["1"].next_fire_at,
        Some(datetime!(2025-01-10 10:00 UTC))
    );
}

#[test]
fn edit_discards_prior_progress() {
    let original = item("1", 15, 0);
    let mut state = plan(&original, datetime!(2025-01-10 09:00 UTC));
    advance_after_fire(&mut state, datetime!(2025-01-10 09:45 UTC));
    assert_eq!(state.step, Some(Step::Start));

    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let mut edited = original.clone();
    edited.start_at = datetime!(2025-01-10 11:00 UTC);
    let next = reconcile(&[edited], datetime!(2025-01-10 09:46 UTC), &prior, &settings());

    let recomputed = &next["1"];
    assert_eq!(recomputed.step, Some(Step::Lead));
    assert_eq!(recomputed.last_fired_at, None);
    assert_eq!(
        recomputed.next_fire_at,
        Some(datetime!(2025-01-10 10:45 UTC))
    );
}

#[test]
fn lead_change_counts_as_edit() {
    let original = item("1", 15, 0);
    let mut state = plan(&original, datetime!(2025-01-10 09:00 UTC));
    advance_after_fire(&mut state, datetime!(2025-01-10 09:45 UTC));
    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let mut edited = original.clone();
    edited.lead_minutes = 5;
    let next = reconcile(&[edited], datetime!(2025-01-10 09:46 UTC), &prior, &settings());

    assert_eq!(next["1"].step, Some(Step::Lead));
    assert_eq!(
        next["1"].next_fire_at,
        Some(datetime!(2025-01-10 09:55 UTC))
    );
}

#[test]
fn end_change_keeps_progress_and_moves_expiry() {
    let original = item("1", 15, 0);
    let mut state = plan(&original, datetime!(2025-01-10 09:00 UTC));
    advance_after_fire(&mut state, datetime!(2025-01-10 09:45 UTC));
    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let mut extended = original.clone();
    extended.end_at = Some(datetime!(2025-01-10 15:00 UTC));
    let next = reconcile(
        &[extended],
        datetime!(2025-01-10 09:46 UTC),
        &prior,
        &settings(),
    );

    let kept = &next["1"];
    assert_eq!(kept.step, Some(Step::Start));
    assert_eq!(kept.last_fired_at, Some(datetime!(2025-01-10 09:45 UTC)));
    assert_eq!(kept.expires_at, datetime!(2025-01-10 15:05 UTC));
}

#[test]
fn rederive_lifts_two_step_start_phase_to_start_instant() {
    let two_step = item("1", 15, 0);
    let mut state = plan(&two_step, datetime!(2025-01-10 09:50 UTC));
    state.next_fire_at = Some(datetime!(2025-01-10 09:00 UTC));
    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let next = reconcile(&[two_step], datetime!(2025-01-10 09:51 UTC), &prior, &settings());
    assert_eq!(
        next["1"].next_fire_at,
        Some(datetime!(2025-01-10 10:00 UTC))
    );
}

#[test]
fn exhausted_schedule_stays_exhausted_on_reconcile() {
    let single = item("1", 0, 0);
    let mut state = plan(&single, datetime!(2025-01-10 09:00 UTC));
    advance_after_fire(&mut state, datetime!(2025-01-10 10:00 UTC));
    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let next = reconcile(&[single], datetime!(2025-01-10 10:01 UTC), &prior, &settings());
    assert_eq!(next["1"].next_fire_at, None);
    assert_eq!(
        next["1"].last_fired_at,
        Some(datetime!(2025-01-10 10:00 UTC))
    );
}

#[test]
fn reconcile_past_expiry_forces_never() {
    let repeating = item("1", 0, 10);
    let state = plan(&repeating, datetime!(2025-01-10 11:00 UTC));
    assert!(state.next_fire_at.is_some());
    let mut prior = ScheduleMap::new();
    prior.insert("1".to_string(), state);

    let next = reconcile(&[repeating], datetime!(2025-01-10 12:06 UTC), &prior, &settings());
    assert_eq!(next["1"].next_fire_at, None);
}

#[test]
fn repeating_advance_spaces_fires_and_clamps_to_expiry() {
    let repeating = item("1", 0, 50);
    let mut state = plan(&repeating, datetime!(2025-01-10 10:00 UTC));

    advance_after_fire(&mut state, datetime!(2025-01-10 10:00 UTC));
    assert_eq!(state.next_fire_at, Some(datetime!(2025-01-10 10:50 UTC)));

    advance_after_fire(&mut state, datetime!(2025-01-10 10:50 UTC));
    assert_eq!(state.next_fire_at, Some(datetime!(2025-01-10 11:40 UTC)));

    advance_after_fire(&mut state, datetime!(2025-01-10 11:40 UTC));
    assert_eq!(state.next_fire_at, Some(datetime!(2025-01-10 12:05 UTC)));

    advance_after_fire(&mut state, datetime!(2025-01-10 12:05 UTC));
    assert_eq!(state.next_fire_at, None);
}

#[test]
fn two_step_advance_fires_lead_then_start_then_stops() {
    let mut state = plan(&item("1", 15, 0), datetime!(2025-01-10 09:00 UTC));

    advance_after_fire(&mut state, datetime!(2025-01-10 09:45 UTC));
    assert_eq!(state.step, Some(Step::Start));
    assert_eq!(state.next_fire_at, Some(datetime!(2025-01-10 10:00 UTC)));

    advance_after_fire(&mut state, datetime!(2025-01-10 10:00 UTC));
    assert_eq!(state.next_fire_at, None);
    assert_eq!(state.last_fired_at, Some(datetime!(2025-01-10 10:00 UTC)));
}
