// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{eval::Interpreter, hooks::HostRuntime};

/// Session failures that must surface as specific wire error codes.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session with id '{0}'")]
    NotFound(String),
    #[error("session '{0}' is already evaluating")]
    Busy(String),
    #[error("host runtime boot failed: {0}")]
    BootFailed(String),
}

/// At most one evaluation runs against a session at a time. The state
/// is `Busy` for the duration of that evaluation and returns to `Idle`
/// when it completes, passing through `Interrupted` if an interrupt was
/// registered while it ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Busy,
    Interrupted,
}

/// One live session: an opaque identifier plus the persistent
/// interpreter that carries bindings across evaluations.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub interpreter: Interpreter,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Session {
        Session {
            id: Uuid::new_v4().to_string(),
            interpreter: Interpreter::new(),
            state: SessionState::Idle,
            created_at: Utc::now(),
        }
    }
}

/// The registry of live sessions, plus the one-shot bootstrap flag for
/// the host runtime. Owned by the server loop and only ever touched
/// from its thread, so there is no locking here.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    booted: bool,
}

impl SessionStore {
    pub fn new() -> SessionStore {
        SessionStore { sessions: HashMap::new(), booted: false }
    }

    /// Creates a fresh session and returns its identifier. The first
    /// successful call boots the host runtime; the flag only sets on
    /// success, so a failed boot leaves the next call free to retry.
    pub fn create_session(
        &mut self,
        runtime: &dyn HostRuntime,
        profile: &str,
    ) -> Result<String, SessionError> {
        if !self.booted {
            info!("booting host runtime with profile '{}'", profile);
            runtime
                .boot(profile)
                .map_err(|e| SessionError::BootFailed(format!("{e:#}")))?;
            self.booted = true;
        }

        let session = Session::new();
        let id = session.id.clone();
        info!("created session {} at {} ({} live)", id, session.created_at, self.sessions.len() + 1);
        self.sessions.insert(id.clone(), session);
        Ok(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn require_mut(&mut self, id: &str) -> Result<&mut Session, SessionError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(String::from(id)))
    }

    /// Destroys every session. Called on shutdown.
    pub fn invalidate_all(&mut self) {
        if !self.sessions.is_empty() {
            warn!("invalidating {} live sessions", self.sessions.len());
        }
        self.sessions.clear();
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
