use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use driftcore::{decide, Character, EventDef, Intent, LocationDef};
use tracing::warn;

use crate::session::MARKER_COOKIE;
use crate::AppState;

const CHARACTER_NAME: &str = "Steve";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(news))
        .route("/setcookie", get(setcookie))
        .route("/success", get(success))
        .route("/:loc", get(goto_location))
}

async fn news(State(st): State<AppState>, jar: CookieJar) -> Response {
    let signed_in = st.sessions.get(&jar).await.is_some();
    Html(render_news_page(signed_in)).into_response()
}

/// Stamps the post-login marker cookie. `/success` refuses to roll a
/// character without it.
async fn setcookie(State(st): State<AppState>, jar: CookieJar) -> Response {
    if st.sessions.get(&jar).await.is_none() {
        return Redirect::temporary("/").into_response();
    }

    let cookie = Cookie::build((MARKER_COOKIE, Utc::now().to_rfc3339()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(st.cookie_secure)
        .build();

    (jar.add(cookie), Redirect::temporary("/success")).into_response()
}

async fn success(State(st): State<AppState>, jar: CookieJar) -> Response {
    let Some((token, _)) = st.sessions.get(&jar).await else {
        return Redirect::temporary("/").into_response();
    };
    if jar.get(MARKER_COOKIE).is_none() {
        return Redirect::temporary("/").into_response();
    }

    let character = Character::new(CHARACTER_NAME, st.world.start_location());
    let Some(def) = st.world.location(&character.location) else {
        // World::load validates the start key; only a bad build gets here.
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    st.sessions.set_character(&token, character.clone()).await;
    Html(render_locations_page(&character, def)).into_response()
}

async fn goto_location(
    State(st): State<AppState>,
    jar: CookieJar,
    Path(loc): Path<String>,
) -> Response {
    let Some((token, rec)) = st.sessions.get(&jar).await else {
        return Redirect::temporary("/").into_response();
    };
    // Authenticated but never visited /success: no character to move yet.
    let Some(character) = rec.character else {
        return Redirect::temporary("/").into_response();
    };

    let step = decide(&st.world, &character, &loc);
    match step.intent {
        Intent::UnknownLocation => (StatusCode::NOT_FOUND, "404 not found").into_response(),
        Intent::Blocked { current } => {
            Redirect::temporary(&format!("/{current}")).into_response()
        }
        Intent::ShowLocation { location } => {
            let Some(def) = st.world.location(&location) else {
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };
            st.sessions.set_character(&token, step.next.clone()).await;
            Html(render_locations_page(&step.next, def)).into_response()
        }
        Intent::ShowEvent { event } => match st.world.event(event) {
            Ok(ev) => {
                st.sessions.set_character(&token, step.next.clone()).await;
                Html(render_event_page(&step.next, ev)).into_response()
            }
            Err(e) => {
                warn!(err = %e, "event table lookup failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title>\
<link rel=\"stylesheet\" href=\"/public/style.css\"></head><body>{}</body></html>",
        html_escape(title),
        body
    )
}

fn render_news_page(signed_in: bool) -> String {
    let action = if signed_in {
        "<p><a href=\"/success\">Continue your wander</a> or <a href=\"/logoff\">log off</a>.</p>".to_string()
    } else {
        "<p><a href=\"/auth/twitter\">Sign in with Twitter</a> to start wandering.</p>".to_string()
    };
    page(
        "driftmud",
        &format!(
            "<h1>driftmud</h1>\
<p>A tiny wander-the-map game. Walk between places by visiting their URL; the world pushes back when a path doesn't exist.</p>\
{action}"
        ),
    )
}

fn render_locations_page(character: &Character, def: &LocationDef) -> String {
    let mut travel = String::new();
    if def.exits.is_empty() {
        travel.push_str("<p>No way out of here.</p>");
    } else {
        travel.push_str("<ul>");
        for to in &def.exits {
            let esc = html_escape(to);
            travel.push_str(&format!("<li><a href=\"/{esc}\">{esc}</a></li>"));
        }
        travel.push_str("</ul>");
    }

    page(
        &character.location,
        &format!(
            "<h1>{}</h1>\
<p>{}</p>\
<h2>Travel</h2>{travel}\
<p>Or stir up an <a href=\"/event\">event</a>.</p>\
<p><small>{} &middot; <a href=\"/logoff\">log off</a></small></p>",
            html_escape(&character.location),
            html_escape(&def.description),
            html_escape(&character.name),
        ),
    )
}

fn render_event_page(character: &Character, ev: &EventDef) -> String {
    let mut choices = String::new();
    choices.push_str("<ul>");
    for c in &ev.choices {
        // Outcomes for these were never written; show them, link nothing.
        choices.push_str(&format!("<li><code>{}</code></li>", html_escape(c)));
    }
    choices.push_str("</ul>");

    page(
        "event",
        &format!(
            "<h1>Event</h1>\
<p>{}</p>\
<h2>Choices</h2>{choices}\
<p><small>{} &middot; <a href=\"/logoff\">log off</a></small></p>",
            html_escape(&ev.description),
            html_escape(&character.name),
        ),
    )
}

fn html_escape(s: &str) -> String {
    // Enough for our minimal pages.
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use driftcore::{Character, EventDef, LocationDef};

    use super::{html_escape, render_event_page, render_locations_page, render_news_page};

    #[test]
    fn html_escape_covers_the_basics() {
        assert_eq!(
            html_escape("<a href=\"x\">&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn locations_page_links_every_exit() {
        let ch = Character::new("Steve", "town");
        let def = LocationDef {
            description: "a town".to_string(),
            exits: vec!["forest".to_string(), "cave".to_string()],
        };
        let html = render_locations_page(&ch, &def);
        assert!(html.contains("<a href=\"/forest\">forest</a>"));
        assert!(html.contains("<a href=\"/cave\">cave</a>"));
        assert!(html.contains("a town"));
        assert!(html.contains("Steve"));
    }

    #[test]
    fn event_page_shows_choices_without_links() {
        let ch = Character::new("Steve", "town");
        let ev = EventDef {
            description: "something <spooky>".to_string(),
            choices: vec!["fight".to_string(), "flee".to_string()],
        };
        let html = render_event_page(&ch, &ev);
        assert!(html.contains("<code>fight</code>"));
        assert!(html.contains("<code>flee</code>"));
        assert!(html.contains("something &lt;spooky&gt;"));
        assert!(!html.contains("href=\"/fight\""));
    }

    #[test]
    fn news_page_offers_sign_in_when_logged_out() {
        let html = render_news_page(false);
        assert!(html.contains("/auth/twitter"));
        let html = render_news_page(true);
        assert!(html.contains("/success"));
    }
}
