use std::collections::HashMap;
use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use driftcore::Character;
use tokio::sync::Mutex;

/// Opaque random token, HttpOnly.
pub const SESSION_COOKIE: &str = "driftmud_session";

/// Timestamped marker set by `/setcookie`; `/success` refuses to create a
/// character without it.
pub const MARKER_COOKIE: &str = "twitterauth";

#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub user_id: String,
    pub username: String,
    pub created_unix: u64,
    pub expires_unix: u64,
    pub character: Option<Character>,
}

/// In-memory session table, token -> record. Lost on restart.
#[derive(Clone)]
pub struct SessionStore {
    ttl_s: u64,
    sessions: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl SessionStore {
    pub fn new(ttl_s: u64) -> Self {
        Self {
            ttl_s,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a fresh authenticated session and return its token.
    pub async fn create(&self, user_id: &str, username: &str) -> String {
        let now = now_unix();
        let token = random_token_hex(24);
        let rec = SessionRecord {
            user_id: user_id.to_string(),
            username: username.to_string(),
            created_unix: now,
            expires_unix: now.saturating_add(self.ttl_s),
            character: None,
        };
        self.sessions.lock().await.insert(token.clone(), rec);
        token
    }

    /// Resolve the session cookie to a live record. Expired records are
    /// reaped on the way through.
    pub async fn get(&self, jar: &CookieJar) -> Option<(String, SessionRecord)> {
        let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string())?;
        let now = now_unix();

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.expires_unix > now);
        let rec = sessions.get(&token).cloned()?;
        Some((token, rec))
    }

    pub async fn set_character(&self, token: &str, character: Character) {
        let mut sessions = self.sessions.lock().await;
        if let Some(rec) = sessions.get_mut(token) {
            rec.character = Some(character);
        }
    }

    pub async fn remove(&self, jar: &CookieJar) {
        let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            return;
        };
        self.sessions.lock().await.remove(&token);
    }
}

pub fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

pub fn random_token_hex(nbytes: usize) -> String {
    let mut b = vec![0u8; nbytes];
    getrandom::getrandom(&mut b).expect("getrandom");
    let mut s = String::with_capacity(nbytes * 2);
    for x in b {
        s.push_str(&format!("{:02x}", x));
    }
    s
}
