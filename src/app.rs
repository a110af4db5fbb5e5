use std::error::Error;
use std::fmt;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;

use crate::alert::ChannelSink;
use crate::config::{Config, ConfigError};
use crate::domain::kind::ItemKind;
use crate::domain::status::ItemStatus;
use crate::scheduler::{Clock, FixedClock, Scheduler, SystemClock};
use crate::source::{HttpBackend, JsonFileSource, SourceError, StatusWriter};
use crate::storage::{SqliteStorage, StorageError};
use crate::store::{ScheduleStore, StoreError};
use crate::ticker::{Collaborators, TickReport, Ticker};

pub struct App {
    db_path: String,
    config: Config,
    sink: Arc<ChannelSink>,
}

/// One row of the status listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScheduleView {
    pub kind: ItemKind,
    pub id: String,
    pub mode: Option<String>,
    pub step: Option<u8>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_fire_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_fired_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    pub exhausted: bool,
    pub muted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MuteOutcome {
    pub kind: ItemKind,
    pub id: String,
    pub changed: bool,
    pub archived: bool,
}

impl App {
    pub fn open(db_path: &str, config_path: &Path) -> Result<Self, AppError> {
        let config = Config::load(config_path)?;
        // Creates the database and applies migrations up front.
        SqliteStorage::open(db_path)?;
        let sink = Arc::new(ChannelSink::new(config.channels.clone()));
        Ok(Self {
            db_path: db_path.to_string(),
            config,
            sink,
        })
    }

    fn open_store(&self, kind: ItemKind) -> Result<ScheduleStore<SqliteStorage>, AppError> {
        let storage = SqliteStorage::open(&self.db_path)?;
        Ok(ScheduleStore::open(storage, kind)?)
    }

    fn backend(&self, kind: ItemKind) -> Result<HttpBackend, AppError> {
        Ok(HttpBackend::new(
            kind,
            &self.config.api.base_url,
            self.config.http_timeout(),
            self.config.api.session_cookie.clone(),
            self.config.utc_offset()?,
        ))
    }

    fn collaborators(
        &self,
        kind: ItemKind,
        items_file: Option<&Path>,
    ) -> Result<Collaborators, AppError> {
        let collaborators = match items_file {
            Some(path) => {
                let source = Arc::new(JsonFileSource::new(path));
                Collaborators {
                    source: source.clone(),
                    status_writer: source,
                    sink: self.sink.clone(),
                }
            }
            None => {
                let backend = Arc::new(self.backend(kind)?);
                Collaborators {
                    source: backend.clone(),
                    status_writer: backend,
                    sink: self.sink.clone(),
                }
            }
        };
        Ok(collaborators)
    }

    fn status_writer(
        &self,
        kind: ItemKind,
        items_file: Option<&Path>,
    ) -> Result<Box<dyn StatusWriter>, AppError> {
        Ok(match items_file {
            Some(path) => Box::new(JsonFileSource::new(path)),
            None => Box::new(self.backend(kind)?),
        })
    }

    pub fn build_scheduler(
        &self,
        kinds: &[ItemKind],
        items_file: Option<&Path>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Scheduler<SqliteStorage>, AppError> {
        if items_file.is_some() && kinds.len() != 1 {
            return Err(AppError::InvalidArgument(
                "--items-file needs exactly one --kind".to_string(),
            ));
        }
        let mut tickers = Vec::with_capacity(kinds.len());
        for kind in kinds {
            tickers.push(Ticker::new(
                self.open_store(*kind)?,
                self.collaborators(*kind, items_file)?,
                self.config.ticker_settings(),
            ));
        }
        Ok(Scheduler::new(
            tickers,
            clock,
            self.config.tick_interval(),
            self.config.poll_interval(),
        ))
    }

    /// Runs the scheduler until killed, or for `duration` when given.
    pub fn run(
        &self,
        kinds: &[ItemKind],
        items_file: Option<&Path>,
        duration: Option<Duration>,
    ) -> Result<(), AppError> {
        let mut scheduler = self.build_scheduler(kinds, items_file, Arc::new(SystemClock))?;
        match duration {
            Some(duration) => {
                let handle = scheduler.start()?;
                std::thread::sleep(duration);
                handle.stop();
            }
            None => scheduler.run_until(&AtomicBool::new(false)),
        }
        Ok(())
    }

    pub fn tick_once(
        &self,
        kinds: &[ItemKind],
        items_file: Option<&Path>,
        now: Option<OffsetDateTime>,
    ) -> Result<Vec<TickReport>, AppError> {
        let clock = FixedClock(now.unwrap_or_else(OffsetDateTime::now_utc));
        let mut scheduler = self.build_scheduler(kinds, items_file, Arc::new(clock))?;
        Ok(scheduler.run_once(clock.now())?)
    }

    pub fn status(&self, kinds: &[ItemKind]) -> Result<Vec<ScheduleView>, AppError> {
        let mut rows = Vec::new();
        for kind in kinds {
            let store = self.open_store(*kind)?;
            for (id, state) in store.states() {
                rows.push(ScheduleView {
                    kind: *kind,
                    id: id.clone(),
                    mode: Some(state.mode.as_str().to_string()),
                    step: state.step.map(|step| step.number()),
                    next_fire_at: state.next_fire_at,
                    last_fired_at: state.last_fired_at,
                    expires_at: Some(state.expires_at),
                    exhausted: state.is_exhausted(),
                    muted: store.is_muted(id),
                });
            }
            for id in store.muted() {
                if store.states().contains_key(id) {
                    continue;
                }
                rows.push(ScheduleView {
                    kind: *kind,
                    id: id.clone(),
                    mode: None,
                    step: None,
                    next_fire_at: None,
                    last_fired_at: None,
                    expires_at: None,
                    exhausted: false,
                    muted: true,
                });
            }
        }
        Ok(rows)
    }

    /// Mutes an item; with `archive` it is also archived at the source.
    pub fn mute(
        &self,
        kind: ItemKind,
        id: &str,
        archive: bool,
        items_file: Option<&Path>,
    ) -> Result<MuteOutcome, AppError> {
        let mut store = self.open_store(kind)?;
        let changed = store.mute(id)?;
        if archive {
            self.status_writer(kind, items_file)?
                .set_status(id, ItemStatus::Archived)?;
        }
        Ok(MuteOutcome {
            kind,
            id: id.to_string(),
            changed,
            archived: archive,
        })
    }

    pub fn unmute(&self, kind: ItemKind, id: &str) -> Result<bool, AppError> {
        Ok(self.open_store(kind)?.unmute(id)?)
    }

    pub fn forget(&self, kind: ItemKind, id: &str) -> Result<bool, AppError> {
        Ok(self.open_store(kind)?.forget(id)?)
    }

    pub fn test_alert(&self) -> Vec<(String, Result<(), String>)> {
        self.sink.test_channels()
    }
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Storage(StorageError),
    Store(StoreError),
    Source(SourceError),
    Config(ConfigError),
    Json(serde_json::Error),
    Delivery(String),
    InvalidArgument(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Storage(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "schedule store error: {}", err),
            AppError::Source(err) => write!(f, "{}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::Delivery(message) => write!(f, "alert delivery failed: {}", message),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Source(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Delivery(_) | AppError::InvalidArgument(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        AppError::Storage(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        AppError::Store(value)
    }
}

impl From<SourceError> for AppError {
    fn from(value: SourceError) -> Self {
        AppError::Source(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Json(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}
