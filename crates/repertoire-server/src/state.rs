use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use repertoire_core::{KeyValueStore, ShakmatyEngine, StudyLibrary, TrainingSession};
use tokio::sync::Mutex;

use crate::config::Config;

pub type Store = Box<dyn KeyValueStore + Send + Sync>;
pub type Library = StudyLibrary<Store>;
pub type Session = TrainingSession<ShakmatyEngine>;
pub type Sessions = Arc<Mutex<HashMap<String, TrainingSlot>>>;

/// A live session and the last time a client touched it.
pub struct TrainingSlot {
    pub session: Session,
    pub last_seen: Instant,
}

impl TrainingSlot {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) -> &mut Session {
        self.last_seen = Instant::now();
        &mut self.session
    }
}

/// Shared service state. Each request holds a lock for one whole transition.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub library: Arc<Mutex<Library>>,
    pub sessions: Sessions,
}

impl AppState {
    pub fn new(config: Config, library: Library) -> Self {
        Self {
            config,
            library: Arc::new(Mutex::new(library)),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Drop sessions no client has touched within the idle TTL. Returns how
    /// many were removed.
    pub async fn prune_idle_sessions(&self) -> usize {
        let ttl = self.config.session_idle_ttl();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|id, slot| {
            let keep = slot.last_seen.elapsed() < ttl;
            if !keep {
                tracing::debug!(session = %id, "Evicting idle training session");
            }
            keep
        });
        before - sessions.len()
    }
}
