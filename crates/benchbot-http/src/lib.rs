//! HTTP hook source: turns `GET /<keyword>/<arg>/...` requests into command
//! invocations and streams the job log back as a chunked text body.
//!
//! A 30-minute wall-clock timer force-closes the response logger so a wedged
//! subprocess can never hold the client stream open forever. Closing the
//! stream does not interrupt the job; it runs to completion regardless.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use benchbot_commander::{Commander, CommandInvocation, CommandLogger};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Hard wall-clock cap on how long one response stream may stay open.
pub const HOOK_LOGGER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const MISSING_KEYWORD_BODY: &str = "Error: Missing keyword";

/// Logger backed by the chunked HTTP response body.
pub struct HttpLogger {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    closed_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl HttpLogger {
    fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
            closed_tx: watch::Sender::new(false),
            closed: AtomicBool::new(false),
        }
    }

    async fn wait_closed(&self) {
        let mut closed_rx = self.closed_tx.subscribe();
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }
}

impl CommandLogger for HttpLogger {
    fn write(&self, text: &str) {
        let guard = lock_unpoisoned(&self.tx);
        if let Some(tx) = guard.as_ref() {
            // The client may have hung up already; nothing to do then.
            let _ = tx.send(text.to_string());
        }
    }

    fn close(&self) {
        lock_unpoisoned(&self.tx).take();
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.closed_tx.send(true);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Arms the force-close timer for one logger. The timer is cancelled the
/// moment the logger's close fires, whichever happens first.
fn bind_logger_timeout(
    logger: Arc<HttpLogger>,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                debug!("forcing logger close after timeout");
                logger.close();
            }
            _ = logger.wait_closed() => {}
        }
    })
}

struct HookServerState {
    commander: Arc<Commander>,
    logger_timeout: Duration,
}

/// The HTTP hook bound to a local address but not yet serving.
pub struct HookServer {
    listener: TcpListener,
    state: Arc<HookServerState>,
}

impl HookServer {
    pub async fn bind(bind: &str, commander: Arc<Commander>) -> Result<Self> {
        Self::bind_with_timeout(bind, commander, HOOK_LOGGER_TIMEOUT).await
    }

    pub async fn bind_with_timeout(
        bind: &str,
        commander: Arc<Commander>,
        logger_timeout: Duration,
    ) -> Result<Self> {
        let bind_addr = bind
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid --bind '{bind}'"))?;
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("failed to bind hook server on {bind_addr}"))?;
        Ok(Self {
            listener,
            state: Arc::new(HookServerState {
                commander,
                logger_timeout,
            }),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to resolve bound hook server address")
    }

    /// Serves until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = Router::new()
            .route("/", get(handle_missing_keyword))
            .route("/{*path}", get(handle_hook_request))
            .with_state(self.state);
        axum::serve(self.listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("hook server exited unexpectedly")
    }
}

async fn handle_missing_keyword() -> Response {
    (StatusCode::OK, MISSING_KEYWORD_BODY).into_response()
}

async fn handle_hook_request(
    State(state): State<Arc<HookServerState>>,
    Path(path): Path<String>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Response {
    let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
    let Some(first) = segments.first() else {
        return (StatusCode::OK, MISSING_KEYWORD_BODY).into_response();
    };
    let keyword = first.to_lowercase();
    let cmd_line = segments.join(" ");
    debug!("received keyword: {keyword}, cmd_line: {cmd_line}");

    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let logger = Arc::new(HttpLogger::new(tx));
    bind_logger_timeout(Arc::clone(&logger), state.logger_timeout);

    let mut parameters = query;
    parameters.insert("cmd_line".to_string(), cmd_line);
    state
        .commander
        .dispatch(CommandInvocation {
            keyword,
            parameters,
            logger: logger as Arc<dyn CommandLogger>,
        })
        .await;

    let stream =
        UnboundedReceiverStream::new(rx).map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
