use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use base64::Engine;
use serde::Deserialize;
use sha2::Digest;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::session::{now_unix, random_token_hex, MARKER_COOKIE, SESSION_COOKIE};
use crate::AppState;

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const USERINFO_URL: &str = "https://api.twitter.com/2/users/me";

// Authorization attempts that never come back expire after this long.
const PENDING_TTL_S: u64 = 15 * 60;

#[derive(Clone)]
pub struct TwitterOAuth {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pending: Arc<Mutex<HashMap<String, PendingLogin>>>,
}

#[derive(Clone, Debug)]
struct PendingLogin {
    verifier: String,
    created_unix: u64,
}

impl TwitterOAuth {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn begin(&self) -> (String, String) {
        let state = random_token_hex(16);
        // Hex keeps the verifier inside the PKCE charset; 64 chars is in range.
        let verifier = random_token_hex(32);

        let now = now_unix();
        let mut pending = self.pending.lock().await;
        pending.retain(|_, p| now.saturating_sub(p.created_unix) < PENDING_TTL_S);
        pending.insert(
            state.clone(),
            PendingLogin {
                verifier: verifier.clone(),
                created_unix: now,
            },
        );
        (state, verifier)
    }

    async fn take(&self, state: &str) -> Option<PendingLogin> {
        let now = now_unix();
        let mut pending = self.pending.lock().await;
        let p = pending.remove(state)?;
        if now.saturating_sub(p.created_unix) >= PENDING_TTL_S {
            return None;
        }
        Some(p)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/twitter", get(auth_twitter))
        .route("/login/twitter/return", get(auth_twitter_return))
        .route("/logoff", get(logoff))
}

fn base64url_sha256(s: &str) -> String {
    let mut h = sha2::Sha256::new();
    h.update(s.as_bytes());
    let out = h.finalize();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(out)
}

async fn auth_twitter(State(st): State<AppState>) -> Response {
    let (Some(client_id), Some(redirect_uri)) = (
        st.oauth.client_id.as_deref(),
        st.oauth.redirect_uri.as_deref(),
    ) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "twitter sso not configured\n",
        )
            .into_response();
    };

    let (state, verifier) = st.oauth.begin().await;
    let challenge = base64url_sha256(&verifier);

    let scope = urlencoding::encode("tweet.read users.read");
    let client_id = urlencoding::encode(client_id);
    let redirect_uri = urlencoding::encode(redirect_uri);
    let state = urlencoding::encode(&state);
    let challenge = urlencoding::encode(&challenge);

    let url = format!(
        "{AUTHORIZE_URL}?response_type=code&client_id={client_id}&redirect_uri={redirect_uri}&scope={scope}&state={state}&code_challenge={challenge}&code_challenge_method=S256"
    );

    Redirect::temporary(&url).into_response()
}

#[derive(Debug, Deserialize)]
struct TwitterCallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwitterTokenResponse {
    access_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TwitterUserResponse {
    data: TwitterUserData,
}

#[derive(Debug, Deserialize)]
struct TwitterUserData {
    id: String,
    #[serde(default)]
    #[allow(dead_code)]
    name: String,
    username: String,
}

/// Callback leg of the handshake. Any failure sends the visitor back to the
/// landing page; only a completed exchange creates a session.
async fn auth_twitter_return(
    State(st): State<AppState>,
    jar: CookieJar,
    Query(q): Query<TwitterCallbackQuery>,
) -> Response {
    if let Some(err) = q.error.as_deref() {
        warn!(
            err,
            detail = q.error_description.as_deref().unwrap_or(""),
            "twitter authorization refused"
        );
        return Redirect::temporary("/").into_response();
    }

    let (Some(state_token), Some(code)) = (q.state.as_deref(), q.code.as_deref()) else {
        return Redirect::temporary("/").into_response();
    };

    let Some(pending) = st.oauth.take(state_token).await else {
        warn!("twitter callback with unknown or expired state");
        return Redirect::temporary("/").into_response();
    };

    let (Some(client_id), Some(client_secret), Some(redirect_uri)) = (
        st.oauth.client_id.as_deref(),
        st.oauth.client_secret.as_deref(),
        st.oauth.redirect_uri.as_deref(),
    ) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "twitter sso not configured\n",
        )
            .into_response();
    };

    let http = reqwest::Client::new();

    let token = match http
        .post(TOKEN_URL)
        .basic_auth(client_id, Some(client_secret))
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("code", code),
            ("code_verifier", pending.verifier.as_str()),
        ])
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(err = %e, "token exchange failed");
            return Redirect::temporary("/").into_response();
        }
    };
    if !token.status().is_success() {
        warn!(status = %token.status(), "token exchange rejected");
        return Redirect::temporary("/").into_response();
    }
    let token: TwitterTokenResponse = match token.json().await {
        Ok(v) => v,
        Err(e) => {
            warn!(err = %e, "token response parse failed");
            return Redirect::temporary("/").into_response();
        }
    };

    let user = match http
        .get(USERINFO_URL)
        .bearer_auth(&token.access_token)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            warn!(err = %e, "userinfo request failed");
            return Redirect::temporary("/").into_response();
        }
    };
    if !user.status().is_success() {
        warn!(status = %user.status(), "userinfo rejected");
        return Redirect::temporary("/").into_response();
    }
    let user: TwitterUserResponse = match user.json().await {
        Ok(v) => v,
        Err(e) => {
            warn!(err = %e, "userinfo parse failed");
            return Redirect::temporary("/").into_response();
        }
    };

    let token = st.sessions.create(&user.data.id, &user.data.username).await;
    info!(user = %user.data.username, "twitter sign-in completed");

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(st.cookie_secure)
        .build();

    (jar.add(cookie), Redirect::temporary("/setcookie")).into_response()
}

async fn logoff(State(st): State<AppState>, jar: CookieJar) -> Response {
    st.sessions.remove(&jar).await;
    let jar = jar
        .remove(Cookie::build((SESSION_COOKIE, "")).path("/").build())
        .remove(Cookie::build((MARKER_COOKIE, "")).path("/").build());
    (jar, Redirect::temporary("/")).into_response()
}
