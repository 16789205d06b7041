//! Operator HTTP endpoint: POST-only routes that drive the slideshow.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ControlError;
use crate::tasks::slideshow::Slideshow;

#[derive(Clone)]
struct ControllerState {
    show: Slideshow,
    shutdown: CancellationToken,
}

/// Every reply is a status code plus a single line of text.
fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    let mut body = message.into();
    body.push('\n');
    (status, body).into_response()
}

fn rejected(action: &str, err: ControlError) -> Response {
    debug!(action, "control request rejected: {err}");
    reply(
        StatusCode::PRECONDITION_FAILED,
        format!("Cannot {action}, {err}"),
    )
}

pub fn router(show: Slideshow, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/freeze", post(freeze))
        .route("/unfreeze", post(unfreeze))
        .route("/shutdown", post(shutdown_request))
        .fallback(unknown)
        .with_state(ControllerState { show, shutdown })
}

/// Serves the controller until the shutdown token is cancelled.
pub async fn run_until_shutdown(
    addr: SocketAddr,
    show: Slideshow,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller on {addr}"))?;
    info!(?addr, "controller listening");

    let app = router(show, shutdown.clone());
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("controller server exited")?;
    info!("controller stopped");
    Ok(())
}

async fn start(State(state): State<ControllerState>) -> Response {
    // The readiness barrier may take a while, so only the launch is awaited.
    match state.show.launch().await {
        Ok(startup) => {
            tokio::spawn(async move {
                match startup.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => info!("slideshow did not start: {err}"),
                    Err(err) => warn!("slideshow startup task failed: {err}"),
                }
            });
            reply(StatusCode::OK, "Starting slideshow")
        }
        Err(err) => rejected("start", err),
    }
}

async fn stop(State(state): State<ControllerState>) -> Response {
    match state.show.stop().await {
        Ok(()) => reply(StatusCode::OK, "Stopping slideshow"),
        Err(err) => rejected("stop", err),
    }
}

async fn freeze(State(state): State<ControllerState>) -> Response {
    match state.show.freeze().await {
        Ok(()) => reply(StatusCode::OK, "Freezing slideshow"),
        Err(err) => rejected("freeze", err),
    }
}

async fn unfreeze(State(state): State<ControllerState>) -> Response {
    match state.show.unfreeze().await {
        Ok(()) => reply(StatusCode::OK, "Unfreezing slideshow"),
        Err(err) => rejected("unfreeze", err),
    }
}

async fn shutdown_request(State(state): State<ControllerState>) -> Response {
    info!("shutdown requested over http");
    state.shutdown.cancel();
    reply(StatusCode::OK, "Shutting down slideshow controller")
}

async fn unknown(method: Method, uri: Uri) -> Response {
    if method != Method::POST {
        debug!(endpoint = %uri.path(), %method, "request with bad method");
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    debug!(endpoint = %uri.path(), "unknown request type");
    reply(StatusCode::BAD_REQUEST, "Unknown request type")
}
