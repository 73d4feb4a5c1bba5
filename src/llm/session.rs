//! Conversation handling on top of a [`ChatClient`].
//!
//! In session mode every conversation id owns its own transcript. Turns of one
//! conversation are serialised by a per-session lock; different conversations
//! never share state. A failed call discards the session so the next message
//! starts over with a fresh id.
//!
//! The map is bounded: sessions idle longer than [`SessionLimits::idle_ttl`]
//! are dropped, the least recently used one goes when the map is full, and a
//! transcript keeps only its last [`SessionLimits::max_exchanges`] exchanges.

use std::collections::HashMap;
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use std::time::Duration;

use chrono::{ DateTime, Utc };
use log::{ debug, info, warn };
use uuid::Uuid;

use super::chat::{ ChatClient, Completion };
use super::LlmMode;
use crate::error::LlmError;
use crate::models::chat::Turn;

#[derive(Debug)]
pub struct ConversationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    turns: Vec<Turn>,
    discarded: bool,
}

impl ConversationSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            turns: Vec::new(),
            discarded: false,
        }
    }
}

type SharedSession = Arc<tokio::sync::Mutex<ConversationSession>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_sessions: usize,
    pub idle_ttl: Duration,
    /// One exchange is a user turn plus the model reply.
    pub max_exchanges: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            idle_ttl: Duration::from_secs(30 * 60),
            max_exchanges: 20,
        }
    }
}

struct Slot {
    session: SharedSession,
    last_used: DateTime<Utc>,
    // LRU order; timestamps can tie
    seq: u64,
}

#[derive(Default)]
struct SessionMap {
    slots: HashMap<String, Slot>,
    tick: u64,
}

impl SessionMap {
    fn evict_idle(&mut self, now: DateTime<Utc>, idle_ttl: Duration) {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            (now - slot.last_used).to_std().map_or(true, |idle| idle <= idle_ttl)
        });
        let evicted = before - self.slots.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
    }

    fn evict_oldest(&mut self, keep: &str) {
        let oldest = self.slots
            .iter()
            .filter(|(key, _)| key.as_str() != keep)
            .min_by_key(|(_, slot)| slot.seq)
            .map(|(key, _)| key.clone());
        if let Some(key) = oldest {
            debug!("Session map full, evicting conversation {}", key);
            self.slots.remove(&key);
        }
    }
}

pub struct ChatSessions {
    client: Arc<dyn ChatClient>,
    mode: LlmMode,
    limits: SessionLimits,
    sessions: Mutex<SessionMap>,
}

impl ChatSessions {
    pub fn new(client: Arc<dyn ChatClient>, mode: LlmMode) -> Self {
        Self::with_limits(client, mode, SessionLimits::default())
    }

    pub fn with_limits(client: Arc<dyn ChatClient>, mode: LlmMode, limits: SessionLimits) -> Self {
        Self {
            client,
            mode,
            limits,
            sessions: Mutex::new(SessionMap::default()),
        }
    }

    pub fn mode(&self) -> LlmMode {
        self.mode
    }

    pub fn model(&self) -> String {
        self.client.get_model()
    }

    /// Messages without a conversation id, and every message in stateless
    /// mode, are one-shot generations.
    pub async fn send(
        &self,
        conversation_id: Option<&str>,
        prompt: &str
    ) -> Result<Completion, LlmError> {
        match (self.mode, conversation_id) {
            (LlmMode::Session, Some(key)) => self.send_in_session(key, prompt).await,
            (LlmMode::Stateless, Some(key)) => {
                debug!("Stateless mode, ignoring conversation id {}", key);
                self.client.complete(prompt).await
            }
            (_, None) => self.client.complete(prompt).await,
        }
    }

    async fn send_in_session(&self, key: &str, prompt: &str) -> Result<Completion, LlmError> {
        loop {
            let shared = self.session_for(key);
            let mut session = shared.lock().await;
            if session.discarded {
                continue;
            }

            let mut transcript = session.turns.clone();
            transcript.push(Turn::user(prompt));
            debug!(
                "Session {} for conversation {} sending {} turns",
                session.id,
                key,
                transcript.len()
            );

            return match self.client.generate(&transcript).await {
                Ok(Completion::Text(text)) => {
                    transcript.push(Turn::model(text.clone()));
                    let keep = self.limits.max_exchanges * 2;
                    if transcript.len() > keep {
                        transcript.drain(..transcript.len() - keep);
                    }
                    session.turns = transcript;
                    Ok(Completion::Text(text))
                }
                // nothing usable to remember
                Ok(other) => Ok(other),
                Err(e) => {
                    warn!(
                        "Discarding session {} for conversation {} (started {}): {}",
                        session.id,
                        key,
                        session.started_at.to_rfc3339(),
                        e
                    );
                    session.discarded = true;
                    self.remove_if_current(key, &shared);
                    Err(e)
                }
            };
        }
    }

    /// Looks up or opens the session for `key` and marks it as used. Idle
    /// sessions are swept first; a full map gives up its least recent entry.
    fn session_for(&self, key: &str) -> SharedSession {
        let now = Utc::now();
        let mut sessions = self.lock_sessions();
        sessions.evict_idle(now, self.limits.idle_ttl);

        sessions.tick += 1;
        let seq = sessions.tick;
        let shared = sessions.slots
            .entry(key.to_string())
            .and_modify(|slot| {
                slot.last_used = now;
                slot.seq = seq;
            })
            .or_insert_with(|| {
                let session = ConversationSession::new();
                info!("Opening session {} for conversation {}", session.id, key);
                Slot {
                    session: Arc::new(tokio::sync::Mutex::new(session)),
                    last_used: now,
                    seq,
                }
            })
            .session.clone();

        while sessions.slots.len() > self.limits.max_sessions.max(1) {
            sessions.evict_oldest(key);
        }
        shared
    }

    fn remove_if_current(&self, key: &str, shared: &SharedSession) {
        let mut sessions = self.lock_sessions();
        if sessions.slots.get(key).is_some_and(|current| Arc::ptr_eq(&current.session, shared)) {
            sessions.slots.remove(key);
        }
    }

    fn lookup(&self, key: &str) -> Option<SharedSession> {
        self.lock_sessions()
            .slots.get(key)
            .map(|slot| slot.session.clone())
    }

    /// Identity of the live session for `key`, if one is open.
    pub async fn session_id(&self, key: &str) -> Option<Uuid> {
        let shared = self.lookup(key)?;
        let session = shared.lock().await;
        Some(session.id)
    }

    pub async fn transcript(&self, key: &str) -> Vec<Turn> {
        let Some(shared) = self.lookup(key) else {
            return Vec::new();
        };
        let session = shared.lock().await;
        session.turns.clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.lock_sessions().slots.len()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
