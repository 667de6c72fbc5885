//! Load-time diagnostics.
//!
//! Loaders report what they touch through a [`LoadObserver`] instead of
//! printing. Observers never fail the load.

use em_contracts::Channel;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadEvent {
    /// A dataset directory was resolved for loading.
    ResolvedDataset {
        family: String,
        tag: String,
        path: PathBuf,
    },
    /// A volume file is about to be read.
    ReadVolume {
        tag: String,
        channel: Channel,
        path: PathBuf,
    },
    /// A requested channel had no file and was filled with zeros.
    ZeroFilled {
        tag: String,
        channel: Channel,
        shape: Vec<usize>,
    },
    /// A superset member is absent on disk.
    SkippedMember {
        family: String,
        tag: String,
        path: PathBuf,
    },
    /// A requested id matched no family.
    UnclaimedId { id: String },
}

pub trait LoadObserver {
    fn observe(&self, event: &LoadEvent);
}

/// Emits every event as a `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn observe(&self, event: &LoadEvent) {
        match event {
            LoadEvent::ResolvedDataset { family, tag, path } => {
                tracing::debug!(%family, %tag, path = %path.display(), "resolved dataset");
            }
            LoadEvent::ReadVolume { tag, channel, path } => {
                tracing::info!(%tag, %channel, path = %path.display(), "reading volume");
            }
            LoadEvent::ZeroFilled { tag, channel, shape } => {
                tracing::info!(%tag, %channel, ?shape, "no volume on disk, using zeros");
            }
            LoadEvent::SkippedMember { family, tag, path } => {
                tracing::info!(%family, %tag, path = %path.display(), "superset member absent, skipping");
            }
            LoadEvent::UnclaimedId { id } => {
                tracing::warn!(%id, "data id matched no dataset family");
            }
        }
    }
}

/// Keeps events in memory; used by tests and tooling.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LoadEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LoadEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Paths of every `ReadVolume` event, in order.
    pub fn read_paths(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LoadEvent::ReadVolume { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }
}

impl LoadObserver for RecordingObserver {
    fn observe(&self, event: &LoadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Initializes a `tracing_subscriber` using `EM_LOG` first, then `RUST_LOG`, then `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("EM_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
