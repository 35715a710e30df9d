// HTTP request handlers for the webhook server
//
// GET /yo/ is called by the Yo service whenever someone Yos the account. The
// handler answers right away; the three side effects start only once the
// response body has been delivered, each in its own task so a failure in one
// never affects the others.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures_util::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error, info, warn};

use crate::stats;
use crate::store::DailyCounter;
use crate::{AppError, AppState};

/// Query parameters of a Yo callback
#[derive(Debug, Deserialize)]
pub(crate) struct YoCallback {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    user_ip: Option<String>,
}

/// Subscribers are stored upper-cased so any casing maps to one member
pub fn normalize_username(username: &str) -> String {
    username.to_uppercase()
}

/// GET /yo/ - Yo webhook callback
pub(crate) async fn handle_yo(
    State(state): State<AppState>,
    Query(callback): Query<YoCallback>,
) -> Result<Response, AppError> {
    info!(
        username = ?callback.username,
        user_ip = ?callback.user_ip,
        "Received Yo callback"
    );

    let Some(username) = callback.username.filter(|u| !u.is_empty()) else {
        return Err(AppError::bad_request(anyhow::anyhow!(
            "no Yo username in the Yo callback"
        )));
    };
    let username = normalize_username(&username);

    let body = DeferredBody {
        chunk: Some(Bytes::from(json!({ "status": "ok" }).to_string())),
        _after: AfterResponse {
            state,
            username: Some(username),
        },
    };
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body),
    )
        .into_response())
}

/// Single-chunk response body that owns the pending side effects.
///
/// The server drops the body once it has written it out (or the client went
/// away), which is what starts the side effects.
struct DeferredBody {
    chunk: Option<Bytes>,
    _after: AfterResponse,
}

impl Stream for DeferredBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }
}

struct AfterResponse {
    state: AppState,
    username: Option<String>,
}

impl Drop for AfterResponse {
    fn drop(&mut self) {
        let Some(username) = self.username.take() else {
            return;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            error!(username = %username, "Response finished outside the runtime, side effects skipped");
            return;
        }
        spawn_side_effects(&self.state, username);
    }
}

/// GET /health - Basic health check
pub(crate) async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// Start the post-response work as three unsupervised tasks
fn spawn_side_effects(state: &AppState, username: String) {
    let yo_state = state.clone();
    let yo_username = username.clone();
    tokio::spawn(async move { yo_random_link(&yo_state, &yo_username).await });

    let subscriber_state = state.clone();
    tokio::spawn(async move { save_subscriber(&subscriber_state, &username).await });

    let stats_state = state.clone();
    tokio::spawn(async move { count_received_yo(&stats_state).await });
}

/// Yo a random candidate link back to `username`
async fn yo_random_link(state: &AppState, username: &str) {
    let count = match state.store.candidate_count().await {
        Ok(count) => count,
        Err(e) => {
            error!(username = %username, error = %e, "Failed to count candidate links");
            return;
        }
    };
    if count != state.target_count {
        warn!(
            count,
            expected = state.target_count,
            "Candidate set size differs from the target"
        );
    }

    let link = match state.store.random_candidate().await {
        Ok(Some(link)) => link,
        Ok(None) => {
            error!(username = %username, "Candidate set is empty, nothing to Yo");
            return;
        }
        Err(e) => {
            error!(username = %username, error = %e, "Failed to pick a random candidate link");
            return;
        }
    };

    debug!(username = %username, link = %link, "Picked random link");
    match state.notifier.yo(username, &link).await {
        Ok(()) => info!(username = %username, link = %link, "Sent Yo"),
        Err(e) => error!(username = %username, link = %link, error = %e, "Failed to Yo link"),
    }
}

/// Add `username` to the subscriber set, counting it when it is new
async fn save_subscriber(state: &AppState, username: &str) {
    match state.store.add_subscriber(username).await {
        Ok(true) => {
            info!(username = %username, "New subscriber");
            increment(state, DailyCounter::NewSubscriber).await;
        }
        Ok(false) => debug!(username = %username, "Returning subscriber"),
        Err(e) => error!(username = %username, error = %e, "Failed to save subscriber"),
    }
}

async fn count_received_yo(state: &AppState) {
    increment(state, DailyCounter::ReceivedYo).await;
}

async fn increment(state: &AppState, counter: DailyCounter) {
    let day = stats::today();
    match state.store.increment_daily(counter, &day).await {
        Ok(value) => debug!(counter = counter.as_str(), day = %day, value, "Updated statistics"),
        Err(e) => error!(
            counter = counter.as_str(),
            day = %day,
            error = %e,
            "Failed to update statistics"
        ),
    }
}
