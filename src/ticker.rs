use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::alert::{Alert, AlertSink};
use crate::domain::item::SchedulableItem;
use crate::domain::kind::ItemKind;
use crate::domain::status::ItemStatus;
use crate::planner::{self, advance_after_fire, PlannerSettings};
use crate::source::{ItemSource, StatusWriter};
use crate::storage::Storage;
use crate::store::{ScheduleStore, StoreError};

pub const DEFAULT_BACKFILL_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerSettings {
    pub planner: PlannerSettings,
    /// Due fires older than this are skipped instead of alerted.
    pub backfill: Duration,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            planner: PlannerSettings::default(),
            backfill: Duration::minutes(DEFAULT_BACKFILL_MINUTES),
        }
    }
}

/// What one tick did, by item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub kind: ItemKind,
    pub fired: Vec<String>,
    pub muted: Vec<String>,
    pub skipped_stale: Vec<String>,
    pub activations: Vec<String>,
    pub alert_failures: Vec<String>,
}

impl TickReport {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            fired: Vec::new(),
            muted: Vec::new(),
            skipped_stale: Vec::new(),
            activations: Vec::new(),
            alert_failures: Vec::new(),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.fired.is_empty()
            && self.skipped_stale.is_empty()
            && self.activations.is_empty()
            && self.alert_failures.is_empty()
    }
}

/// External collaborators of a ticker.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn ItemSource + Send + Sync>,
    pub status_writer: Arc<dyn StatusWriter + Send + Sync>,
    pub sink: Arc<dyn AlertSink + Send + Sync>,
}

/// Fire engine for one item kind.
pub struct Ticker<S> {
    kind: ItemKind,
    collaborators: Collaborators,
    store: ScheduleStore<S>,
    items: Vec<SchedulableItem>,
    items_loaded: bool,
    // id -> lead instant the activation was requested for
    activation_requested: BTreeMap<String, OffsetDateTime>,
    settings: TickerSettings,
}

impl<S: Storage> Ticker<S> {
    pub fn new(
        store: ScheduleStore<S>,
        collaborators: Collaborators,
        settings: TickerSettings,
    ) -> Self {
        Self {
            kind: store.kind(),
            collaborators,
            store,
            items: Vec::new(),
            items_loaded: false,
            activation_requested: BTreeMap::new(),
            settings,
        }
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    #[cfg(test)]
    pub fn items(&self) -> &[SchedulableItem] {
        &self.items
    }

    #[cfg(test)]
    pub fn store(&self) -> &ScheduleStore<S> {
        &self.store
    }

    #[cfg(test)]
    pub fn store_mut(&mut self) -> &mut ScheduleStore<S> {
        &mut self.store
    }

    /// Fetches items and reconciles. A failed fetch keeps the previous list.
    pub fn poll(&mut self, now: OffsetDateTime) -> Result<bool, StoreError> {
        let fetched = match self.collaborators.source.fetch_eligible_items() {
            Ok(items) => {
                self.replace_items(items);
                true
            }
            Err(err) => {
                warn!(
                    kind = self.kind.as_str(),
                    error = %err,
                    "item fetch failed, keeping previous list"
                );
                false
            }
        };
        self.reconcile(now)?;
        Ok(fetched)
    }

    pub fn replace_items(&mut self, items: Vec<SchedulableItem>) {
        self.items = items
            .into_iter()
            .filter(|item| item.status.is_eligible())
            .collect();
        self.items_loaded = true;
        let present = self
            .items
            .iter()
            .map(|item| item.id.as_str())
            .collect::<BTreeSet<_>>();
        self.activation_requested
            .retain(|id, _| present.contains(id.as_str()));
    }

    /// Brings persisted state in line with the current item list.
    ///
    /// Does nothing until a list has been loaded, so a source that is down at
    /// startup cannot wipe state persisted by an earlier run.
    pub fn reconcile(&mut self, now: OffsetDateTime) -> Result<(), StoreError> {
        self.store.refresh_if_changed()?;
        if !self.items_loaded {
            debug!(
                kind = self.kind.as_str(),
                "no item list yet, skipping reconciliation"
            );
            return Ok(());
        }
        let next = planner::reconcile(
            &self.items,
            now,
            self.store.states(),
            &self.settings.planner,
        );
        self.store.save(next)?;

        let tracked = self
            .items
            .iter()
            .map(|item| item.id.clone())
            .collect::<BTreeSet<_>>();
        self.store.retain_mutes(|id| tracked.contains(id))?;
        Ok(())
    }

    /// Raises alerts for every due, unmuted item and advances its state.
    pub fn tick(&mut self, now: OffsetDateTime) -> Result<TickReport, StoreError> {
        self.store.refresh_if_changed()?;
        let mut report = TickReport::new(self.kind);
        self.request_activations(now, &mut report);

        let mut states = self.store.states().clone();
        for item in &self.items {
            let Some(state) = states.get_mut(&item.id) else {
                continue;
            };
            if !state.is_due(now) {
                continue;
            }
            if self.store.is_muted(&item.id) {
                report.muted.push(item.id.clone());
                continue;
            }

            let overdue = state.next_fire_at.map_or(Duration::ZERO, |next| now - next);
            if overdue > self.settings.backfill {
                info!(
                    kind = self.kind.as_str(),
                    item_id = %item.id,
                    overdue_minutes = overdue.whole_minutes(),
                    "skipping stale fire"
                );
                advance_after_fire(state, now);
                report.skipped_stale.push(item.id.clone());
                continue;
            }

            let alert = Alert::for_item(self.kind, item);
            match self.collaborators.sink.raise_alert(&alert) {
                Ok(()) => {
                    info!(
                        kind = self.kind.as_str(),
                        item_id = %item.id,
                        mode = state.mode.as_str(),
                        step = state.step.map(|step| step.number()),
                        "alert raised"
                    );
                    report.fired.push(item.id.clone());
                }
                Err(err) => {
                    warn!(
                        kind = self.kind.as_str(),
                        item_id = %item.id,
                        error = %err,
                        "alert failed"
                    );
                    report.alert_failures.push(item.id.clone());
                }
            }
            advance_after_fire(state, now);
        }

        self.store.save(states)?;
        Ok(report)
    }

    // Pending items whose lead instant has passed are switched to active at the
    // source. Failures are retried on the next tick.
    fn request_activations(&mut self, now: OffsetDateTime, report: &mut TickReport) {
        for item in &mut self.items {
            if item.status != ItemStatus::Pending || item.validate().is_err() {
                continue;
            }
            let lead_at = item.lead_at();
            if now < lead_at || now > self.settings.planner.expires_at(item) {
                continue;
            }
            if self.activation_requested.get(&item.id) == Some(&lead_at) {
                continue;
            }
            match self
                .collaborators
                .status_writer
                .set_status(&item.id, ItemStatus::Active)
            {
                Ok(()) => {
                    info!(kind = self.kind.as_str(), item_id = %item.id, "item activated");
                    self.activation_requested.insert(item.id.clone(), lead_at);
                    item.status = ItemStatus::Active;
                    report.activations.push(item.id.clone());
                }
                Err(err) => {
                    warn!(
                        kind = self.kind.as_str(),
                        item_id = %item.id,
                        error = %err,
                        "activation failed, will retry"
                    );
                }
            }
        }
    }
}
