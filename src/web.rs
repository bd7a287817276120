use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::control::{ControlHandle, ControlSnapshot};
use crate::events::ControlCommand;

#[derive(Clone)]
struct AppState {
    control: ControlHandle,
}

#[derive(Debug, Serialize)]
struct Ack {
    message: &'static str,
}

pub fn router(control: ControlHandle) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/control", get(control_page))
        .route("/{command}", post(submit))
        .with_state(AppState { control })
}

/// Serve the control API until `cancel` fires.
pub fn spawn(
    control: ControlHandle,
    bind_addr: SocketAddr,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let app = router(control);
    tokio::spawn(async move {
        match TcpListener::bind(bind_addr).await {
            Ok(listener) => {
                info!(%bind_addr, "control server listening");
                let shutdown = cancel.clone();
                if let Err(err) = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        shutdown.cancelled().await;
                    })
                    .await
                {
                    tracing::error!(error = %err, "control server failed");
                }
            }
            Err(err) => {
                tracing::error!(error = %err, %bind_addr, "failed to bind control server");
            }
        }
    })
}

async fn status(State(state): State<AppState>) -> Json<ControlSnapshot> {
    Json(state.control.snapshot())
}

async fn submit(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    match raw.parse::<ControlCommand>() {
        Ok(command) => {
            info!(%command, "control command received");
            state.control.submit(command);
            Json(Ack {
                message: acknowledgement(command),
            })
            .into_response()
        }
        Err(err) => {
            warn!(error = %err, "ignoring control request");
            (
                StatusCode::NOT_FOUND,
                Json(Ack {
                    message: "Unknown command",
                }),
            )
                .into_response()
        }
    }
}

fn acknowledgement(command: ControlCommand) -> &'static str {
    match command {
        ControlCommand::Pause => "Paused slideshow",
        ControlCommand::Resume => "Resumed slideshow",
        ControlCommand::SkipNext => "Skipping to next photo",
        ControlCommand::ForceRefresh => "Album refresh requested",
    }
}

async fn control_page() -> Html<&'static str> {
    Html(CONTROL_PAGE)
}

const CONTROL_PAGE: &str = "<!doctype html><html lang='en'><head><meta charset='utf-8'><meta name='viewport' content='width=device-width,initial-scale=1'>\
<title>Photo Frame Control</title><style>body{font-family:system-ui,sans-serif;margin:0;background:#0b1d26;color:#f7f9fb;}main{max-width:480px;margin:0 auto;padding:2rem 1rem;}\
h1{font-size:1.6rem;}div.buttons{display:grid;grid-template-columns:1fr 1fr;gap:0.75rem;}button{padding:0.9rem;border:none;border-radius:12px;font-size:1.05rem;font-weight:700;\
background:#4361ee;color:#fff;cursor:pointer;}pre{background:#132b3a;padding:1rem;border-radius:12px;white-space:pre-wrap;}</style></head><body><main><h1>Photo Frame</h1>\
<div class='buttons'><button onclick=\"send('pause')\">Pause</button><button onclick=\"send('resume')\">Resume</button><button onclick=\"send('next')\">Next</button>\
<button onclick=\"send('refresh')\">Refresh album</button></div><pre id='state'>loading…</pre></main><script>\
async function poll(){const r=await fetch('/');document.getElementById('state').textContent=JSON.stringify(await r.json(),null,2);}\
async function send(c){await fetch('/'+c,{method:'POST'});setTimeout(poll,300);}poll();setInterval(poll,3000);</script></body></html>";
