//! Session state: bearer token, authenticated user, credit balance.
//!
//! Owned explicitly by the engine rather than living in process-wide
//! globals, so the workflow can be exercised in tests with a plain
//! in-memory instance. A file-backed instance persists the session as
//! pretty-printed JSON across runs; the auth callback handler and the
//! logout action are the only writers.

use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// Credit balance assumed when the backend profile does not carry one
pub const DEFAULT_CREDITS: i64 = 50;

fn default_credits() -> i64 {
    DEFAULT_CREDITS
}

/// Persisted shape of the session file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionData {
    token: Option<String>,
    user: Option<UserProfile>,
    #[serde(default = "default_credits")]
    credits: i64,
}

impl Default for SessionData {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            credits: DEFAULT_CREDITS,
        }
    }
}

/// Single authoritative holder of the login state
pub struct SessionStore {
    path: Option<PathBuf>,
    data: Mutex<SessionData>,
}

impl SessionStore {
    /// Store with no backing file; state lives only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: Mutex::new(SessionData::default()),
        }
    }

    /// Store backed by the given file. A missing or unreadable file
    /// yields a logged-out session rather than an error.
    pub fn open(path: PathBuf) -> Self {
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(data) => data,
                Err(e) => {
                    warn!("[session] Ignoring unreadable session file: {}", e);
                    SessionData::default()
                }
            },
            Err(_) => SessionData::default(),
        };
        Self {
            path: Some(path),
            data: Mutex::new(data),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.data.lock().unwrap().token.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.data.lock().unwrap().user.clone()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.data.lock().unwrap().user.as_ref().map(|u| u.id)
    }

    pub fn credits(&self) -> i64 {
        self.data.lock().unwrap().credits
    }

    pub fn is_logged_in(&self) -> bool {
        let data = self.data.lock().unwrap();
        data.token.is_some() && data.user.is_some()
    }

    /// Stores the token and profile from a successful login exchange
    pub fn log_in(&self, token: String, user: UserProfile) {
        let mut data = self.data.lock().unwrap();
        data.credits = user.credits.unwrap_or(DEFAULT_CREDITS);
        info!(
            "[session] Logged in as {} ({} credits)",
            user.display_name().unwrap_or("<unnamed>"),
            data.credits
        );
        data.token = Some(token);
        data.user = Some(user);
        self.persist(&data);
    }

    /// Clears the session back to the logged-out state
    pub fn log_out(&self) {
        let mut data = self.data.lock().unwrap();
        *data = SessionData::default();
        info!("[session] Logged out");
        self.persist(&data);
    }

    /// Adjusts the credit balance by a signed delta
    pub fn update_credits(&self, delta: i64) {
        let mut data = self.data.lock().unwrap();
        data.credits += delta;
        self.persist(&data);
    }

    /// Best-effort write-through; persistence failures only warn
    fn persist(&self, data: &SessionData) {
        let path = match &self.path {
            Some(path) => path,
            None => return,
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("[session] Failed to create session directory: {}", e);
                return;
            }
        }
        match serde_json::to_string_pretty(data) {
            Ok(content) => {
                if let Err(e) = std::fs::write(path, content) {
                    warn!("[session] Failed to save session: {}", e);
                }
            }
            Err(e) => warn!("[session] Failed to serialize session: {}", e),
        }
    }
}

/// Reads the `#token=<value>` fragment from an OAuth callback URL.
///
/// Returns the token plus the URL with the fragment stripped, so the
/// caller retains a clean URL and the token cannot be read twice.
/// Returns `None` when the URL carries no token fragment.
pub fn extract_callback_token(url: &str) -> Option<(String, String)> {
    let (base, fragment) = url.split_once('#')?;
    let token = fragment.strip_prefix("token=")?;
    if token.is_empty() {
        return None;
    }
    Some((token.to_string(), base.to_string()))
}
