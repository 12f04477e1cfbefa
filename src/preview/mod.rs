//! Live preview server.
//!
//! Serves a base directory over HTTP on localhost. The index document is served
//! at `/` with a small script injected that connects back over a websocket;
//! calling [`ReloadTrigger::reload`] tells every connected browser to reload.

use anyhow::{Context, Result};
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use globset::Glob;
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::ServeDir;

const RELOAD_ROUTE: &str = "/__livereload";
const RELOAD_SCRIPT: &str = include_str!("livereload.js");

/// Message pushed to connected browsers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Idle,
    Reload { pattern: String },
}

/// Sends reload messages to every connected browser.
#[derive(Debug)]
pub struct ReloadTrigger {
    index: String,
    tx: watch::Sender<Message>,
}

impl ReloadTrigger {
    pub fn new<S: Into<String>>(index: S) -> Self {
        let (tx, _) = watch::channel(Message::Idle);
        Self {
            index: index.into(),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Message> {
        self.tx.subscribe()
    }

    /// Reload browsers if `pattern` matches the served index document.
    ///
    /// Returns whether a reload was sent.
    pub fn reload(&self, pattern: &str) -> Result<bool> {
        let matcher = Glob::new(pattern)
            .with_context(|| format!("Invalid reload glob: {pattern}"))?
            .compile_matcher();

        if !matcher.is_match(&self.index) {
            log::debug!("reload pattern {pattern} doesn't match {}", self.index);
            return Ok(false);
        }

        log::debug!(
            "reloading {} preview client(s)",
            self.tx.receiver_count()
        );
        self.tx.send_replace(Message::Reload {
            pattern: pattern.to_string(),
        });
        Ok(true)
    }
}

/// Preview server configuration.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    /// Directory served statically
    pub base_dir: PathBuf,
    /// File name (relative to `base_dir`) served at `/`
    pub index: String,
    pub port: u16,
    pub open_browser: bool,
}

/// A running preview server.
pub struct PreviewServer {
    addr: SocketAddr,
    trigger: Arc<ReloadTrigger>,
}

impl PreviewServer {
    /// Bind the listener, start serving in the background, and open the
    /// preview in the default browser if configured to.
    pub async fn start(config: PreviewConfig) -> Result<Self> {
        let PreviewConfig {
            base_dir,
            index,
            port,
            open_browser,
        } = config;

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("Failed to bind preview server to port {port}"))?;
        let addr = listener
            .local_addr()
            .with_context(|| "Failed to get preview server address")?;

        let trigger = Arc::new(ReloadTrigger::new(index.clone()));
        let app = router(PreviewState {
            base_dir: Arc::new(base_dir),
            index: Arc::from(index),
            trigger: trigger.clone(),
        });

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("Preview server stopped: {e}");
            }
        });

        let url = format!("http://{addr}/");
        log::info!("Preview available at {url}");
        if open_browser {
            if let Err(e) = webbrowser::open(&url) {
                log::warn!("Failed to open a browser for {url}: {e}");
            }
        }

        Ok(Self { addr, trigger })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn trigger(&self) -> &ReloadTrigger {
        &self.trigger
    }
}

#[derive(Clone)]
struct PreviewState {
    base_dir: Arc<PathBuf>,
    index: Arc<str>,
    trigger: Arc<ReloadTrigger>,
}

fn router(state: PreviewState) -> Router {
    let static_files = ServeDir::new(state.base_dir.as_path());
    Router::new()
        .route("/", get(index))
        .route(RELOAD_ROUTE, get(livereload))
        .fallback_service(static_files)
        .with_state(state)
}

/// Insert the reload script right before `</body>`, or at the end.
pub fn inject_reload_script(html: &str) -> String {
    let script = format!("<script>{RELOAD_SCRIPT}</script>");
    match html.rfind("</body>") {
        Some(i) => format!("{}{script}{}", &html[..i], &html[i..]),
        None => format!("{html}{script}"),
    }
}

async fn index(State(state): State<PreviewState>) -> Response {
    let path = state.base_dir.join(&*state.index);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(inject_reload_script(&html)).into_response(),
        Err(e) => {
            log::debug!("can't serve {}: {e}", path.display());
            (
                StatusCode::NOT_FOUND,
                format!("{} hasn't been compiled yet", path.display()),
            )
                .into_response()
        }
    }
}

async fn livereload(ws: WebSocketUpgrade, State(state): State<PreviewState>) -> Response {
    let msg_rx = state.trigger.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, msg_rx))
}

async fn handle_websocket(mut socket: WebSocket, mut msg_rx: watch::Receiver<Message>) {
    while msg_rx.changed().await.is_ok() {
        let msg = msg_rx.borrow_and_update().clone();

        let Ok(text) = serde_json::to_string(&msg) else {
            break;
        };

        if socket.send(WsMessage::Text(text)).await.is_err() {
            break;
        }
    }

    let _ = socket.send(WsMessage::Close(None)).await;
}
