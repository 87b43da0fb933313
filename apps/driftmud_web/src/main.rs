use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::Host;
use axum::http::Uri;
use axum::response::Redirect;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use driftcore::World;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod game;
mod session;

use auth::TwitterOAuth;
use session::SessionStore;

fn usage_and_exit() -> ! {
    eprintln!(
        "driftmud_web

USAGE:
  driftmud_web [--bind HOST:PORT] [--dir PATH] [--https-bind HOST:PORT --tls-cert PATH --tls-key PATH]

ENV:
  BIND                   default 0.0.0.0:8080
  STATIC_DIR             default public
  HTTPS_BIND             optional
  TLS_CERT               required if HTTPS_BIND set
  TLS_KEY                required if HTTPS_BIND set
  RUN_MODE               development | production (default development; picks log verbosity)
  SESSION_TTL_S          default 86400
  TWITTER_CLIENT_ID      required to enable Twitter sign-in
  TWITTER_CLIENT_SECRET  required to enable Twitter sign-in
  TWITTER_CALLBACK_URL   required to enable Twitter sign-in (e.g. https://driftmud.example/login/twitter/return)
"
    );
    std::process::exit(2);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunMode {
    Development,
    Production,
}

#[derive(Clone, Debug)]
struct Config {
    http_bind: SocketAddr,
    https_bind: Option<SocketAddr>,
    static_dir: PathBuf,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
    run_mode: RunMode,
    session_ttl_s: u64,
    twitter_client_id: Option<String>,
    twitter_client_secret: Option<String>,
    twitter_callback_url: Option<String>,
}

fn parse_args() -> Config {
    let mut bind: SocketAddr = std::env::var("BIND")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let mut https_bind: Option<SocketAddr> = std::env::var("HTTPS_BIND")
        .ok()
        .and_then(|v| v.parse().ok());

    let mut dir: PathBuf = std::env::var("STATIC_DIR")
        .unwrap_or_else(|_| "public".to_string())
        .into();

    let mut tls_cert: Option<PathBuf> = std::env::var("TLS_CERT").ok().map(Into::into);
    let mut tls_key: Option<PathBuf> = std::env::var("TLS_KEY").ok().map(Into::into);

    let run_mode = match std::env::var("RUN_MODE").as_deref() {
        Ok("production") => RunMode::Production,
        Ok("development") | Err(_) => RunMode::Development,
        Ok(_) => usage_and_exit(),
    };

    let session_ttl_s: u64 = std::env::var("SESSION_TTL_S")
        .unwrap_or_else(|_| "86400".to_string())
        .parse()
        .unwrap_or_else(|_| usage_and_exit());

    let twitter_client_id = std::env::var("TWITTER_CLIENT_ID").ok();
    let twitter_client_secret = std::env::var("TWITTER_CLIENT_SECRET").ok();
    let twitter_callback_url = std::env::var("TWITTER_CALLBACK_URL").ok();

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                bind = v.parse().unwrap_or_else(|_| usage_and_exit());
            }
            "--https-bind" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                https_bind = Some(v.parse().unwrap_or_else(|_| usage_and_exit()));
            }
            "--dir" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                dir = v.into();
            }
            "--tls-cert" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                tls_cert = Some(v.into());
            }
            "--tls-key" => {
                let v = it.next().unwrap_or_else(|| usage_and_exit());
                tls_key = Some(v.into());
            }
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        http_bind: bind,
        https_bind,
        static_dir: dir,
        tls_cert,
        tls_key,
        run_mode,
        session_ttl_s,
        twitter_client_id,
        twitter_client_secret,
        twitter_callback_url,
    }
}

#[derive(Clone)]
pub struct AppState {
    pub world: Arc<World>,
    pub sessions: SessionStore,
    pub oauth: TwitterOAuth,
    pub cookie_secure: bool,
}

async fn healthz() -> &'static str {
    "ok\n"
}

async fn redirect_to_https(Host(host): Host, uri: Uri) -> Redirect {
    // Host may include :port; strip it for canonical redirects.
    let host = host.split(':').next().unwrap_or(&host);
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Redirect::permanent(&format!("https://{host}{path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = parse_args();

    let default_filter = match cfg.run_mode {
        RunMode::Development => "debug,tower_http=debug,hyper=info",
        RunMode::Production => "info,tower_http=info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    let https_enabled = cfg.https_bind.is_some();
    if https_enabled && (cfg.tls_cert.is_none() || cfg.tls_key.is_none()) {
        eprintln!("ERROR: HTTPS_BIND set but TLS_CERT/TLS_KEY not set");
        std::process::exit(2);
    }

    let world = World::load().context("load world data")?;
    let state = AppState {
        world: Arc::new(world),
        sessions: SessionStore::new(cfg.session_ttl_s),
        oauth: TwitterOAuth::new(
            cfg.twitter_client_id.clone(),
            cfg.twitter_client_secret.clone(),
            cfg.twitter_callback_url.clone(),
        ),
        cookie_secure: https_enabled,
    };

    let app_https = Router::new()
        .route("/healthz", get(healthz))
        .merge(game::router())
        .merge(auth::router())
        .nest_service("/public", ServeDir::new(&cfg.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let app_http = if https_enabled {
        Router::new()
            .route("/healthz", get(healthz))
            .fallback(redirect_to_https)
            .layer(TraceLayer::new_for_http())
    } else {
        app_https.clone()
    };

    info!(
        http_bind = ?cfg.http_bind,
        https_bind = ?cfg.https_bind,
        static_dir = %cfg.static_dir.display(),
        run_mode = ?cfg.run_mode,
        sso = cfg.twitter_client_id.is_some(),
        "starting driftmud_web"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
        info!("shutdown signal received");
    });

    let mut joins = Vec::new();
    {
        let listener = tokio::net::TcpListener::bind(cfg.http_bind)
            .await
            .context("http bind failed")?;
        let rx = shutdown_rx.clone();
        joins.push(tokio::spawn(async move {
            axum::serve(listener, app_http)
                .with_graceful_shutdown(wait_for_shutdown(rx))
                .await
                .expect("http server failed");
        }));
    }

    if let (Some(https_bind), Some(cert), Some(key)) =
        (cfg.https_bind, cfg.tls_cert.as_ref(), cfg.tls_key.as_ref())
    {
        let rustls = RustlsConfig::from_pem_file(cert, key)
            .await
            .context("invalid TLS_CERT/TLS_KEY")?;
        let rx = shutdown_rx.clone();
        joins.push(tokio::spawn(async move {
            let handle = axum_server::Handle::new();

            {
                let handle = handle.clone();
                tokio::spawn(async move {
                    wait_for_shutdown(rx).await;
                    handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
                });
            }

            axum_server::bind_rustls(https_bind, rustls)
                .handle(handle)
                .serve(app_https.into_make_service())
                .await
                .expect("https server failed");
        }));
    }

    for j in joins {
        let _ = j.await;
    }
    Ok(())
}

async fn wait_for_shutdown(mut rx: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
