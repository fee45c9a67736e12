pub mod game;
pub mod scoring;
mod slot;
mod sse;
pub mod state_machine;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::game_store::GameStore};

pub use self::slot::SessionSlot;
pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};

pub type SharedState = Arc<AppState>;
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

/// Central application state storing live sessions and the storage handle.
pub struct AppState {
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    sessions: DashMap<String, Arc<SessionSlot>>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            game_store: RwLock::new(None),
            sessions: DashMap::new(),
            degraded: degraded_tx,
            config: Arc::new(config),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update the degraded flag; unchanged values are ignored.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }

    /// Live session registered under `pin`.
    pub fn session(&self, pin: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.get(pin).map(|entry| Arc::clone(entry.value()))
    }

    /// Register a session slot, refusing to replace a live session with the same PIN.
    pub fn insert_session(&self, slot: Arc<SessionSlot>) -> bool {
        match self.sessions.entry(slot.pin().to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                true
            }
        }
    }

    /// Whether a live session uses `pin`.
    pub fn has_session(&self, pin: &str) -> bool {
        self.sessions.contains_key(pin)
    }

    /// Drop a session from memory.
    pub fn remove_session(&self, pin: &str) -> Option<Arc<SessionSlot>> {
        self.sessions.remove(pin).map(|(_, slot)| slot)
    }

    /// Handles to every live session.
    pub fn sessions(&self) -> Vec<Arc<SessionSlot>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Maximum duration of a transition's work before it is aborted.
    pub fn transition_timeout(&self) -> Option<Duration> {
        self.transition_timeout
    }
}
