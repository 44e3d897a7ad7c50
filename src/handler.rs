//! HTTP and WebSocket handlers
//!
//! This module implements:
//! - The WebSocket endpoint the browser client drives generation jobs through
//! - The root handler, which upgrades WebSocket handshakes and otherwise
//!   serves the client's `index.html`
//! - A health check endpoint

use std::convert::Infallible;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};

use crate::generator::{generate_codes, JobOutcome};
use crate::model::{ClientMessage, GenerationRequest, ServerMessage};
use crate::state::AppState;

pub const JOB_IN_PROGRESS: &str = "A generation is already in progress";

/// Upgrades `GET /ws` to a WebSocket connection
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles `GET /`
///
/// The browser client opens its socket at the server root, so a handshake
/// there is upgraded like `/ws`. Plain page loads get `index.html`.
pub async fn root_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
    request: Request,
) -> Response {
    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state))
            .into_response(),
        Err(_) => {
            let index = Path::new(&state.config.static_dir).join("index.html");
            let served: Result<_, Infallible> = ServeFile::new(index).oneshot(request).await;
            match served {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            }
        }
    }
}

/// Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Per-connection job bookkeeping
///
/// At most one generation job runs per connection. The cancel flag is shared
/// with the running job, which polls it between API calls.
pub struct Connection {
    state: AppState,
    tx: UnboundedSender<ServerMessage>,
    cancel: Arc<AtomicBool>,
    job: Option<JoinHandle<JobOutcome>>,
}

impl Connection {
    pub fn new(state: AppState) -> (Self, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Self {
            state,
            tx,
            cancel: Arc::new(AtomicBool::new(false)),
            job: None,
        };
        (conn, rx)
    }

    pub fn is_generating(&self) -> bool {
        self.job.as_ref().is_some_and(|job| !job.is_finished())
    }

    /// Parses and dispatches one text frame from the client
    pub fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(ClientMessage::StartGeneration(request)) => {
                info!("Received START_GENERATION");
                self.start(request);
            }
            Ok(ClientMessage::CancelGeneration) => {
                info!("Received CANCEL_GENERATION");
                self.cancel();
            }
            Err(e) => {
                warn!("Malformed client message: {e}");
                self.reply(ServerMessage::error(format!("Malformed message: {e}")));
            }
        }
    }

    fn start(&mut self, request: GenerationRequest) {
        if self.is_generating() {
            self.reply(ServerMessage::error(JOB_IN_PROGRESS));
            return;
        }

        self.cancel.store(false, Ordering::SeqCst);
        let api = self.state.stripe.clone();
        let cancel = self.cancel.clone();
        let tx = self.tx.clone();
        self.job = Some(tokio::spawn(async move {
            let outcome = generate_codes(api.as_ref(), &request, &cancel, &tx).await;
            debug!(?outcome, "generation job finished");
            outcome
        }));
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Waits for the current job, if any, and returns how it ended
    pub async fn join(&mut self) -> Option<JobOutcome> {
        let job = self.job.take()?;
        job.await.ok()
    }

    fn reply(&self, msg: ServerMessage) {
        // The receiver lives as long as the socket loop
        let _ = self.tx.send(msg);
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    info!("Client connected");
    let (mut conn, mut outbound) = Connection::new(state);

    loop {
        tokio::select! {
            Some(msg) = outbound.recv() => {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to serialize message: {e}");
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(text.into())).await {
                    warn!("WebSocket send failed: {e}");
                    break;
                }
            }
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => conn.handle_text(text.as_str()),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {e}");
                    break;
                }
            },
        }
    }

    // Stop any running job at its next iteration
    conn.cancel();
    info!("Client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::AppError;
    use crate::stripe::{PromotionCode, PromotionCodeParams, PromotionCodes};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Blocks every call until released, so tests control job timing
    #[derive(Default)]
    struct GatedStripe {
        entered: Notify,
        gate: Notify,
    }

    #[async_trait]
    impl PromotionCodes for GatedStripe {
        async fn create(&self, _params: &PromotionCodeParams) -> Result<PromotionCode, AppError> {
            self.entered.notify_one();
            self.gate.notified().await;
            Ok(PromotionCode {
                id: "promo_1".into(),
                code: "GATED".into(),
            })
        }
    }

    fn state(api: Arc<dyn PromotionCodes>) -> AppState {
        AppState {
            config: Arc::new(Config {
                port: 0,
                static_dir: "client/build".into(),
                stripe_secret_key: "sk_test".into(),
                stripe_api_base: "http://127.0.0.1:1".into(),
            }),
            stripe: api,
        }
    }

    fn start_message(count: u64) -> String {
        json!({
            "type": "START_GENERATION",
            "payload": { "coupon": "SUMMER25", "count": count, "user": "Ilan" }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_malformed_message_replies_error() {
        let api = Arc::new(GatedStripe::default());
        let (mut conn, mut rx) = Connection::new(state(api));

        conn.handle_text("not json");
        match rx.try_recv().unwrap() {
            ServerMessage::Error { message } => assert!(message.starts_with("Malformed message")),
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(!conn.is_generating());
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let api = Arc::new(GatedStripe::default());
        let (mut conn, mut rx) = Connection::new(state(api.clone()));

        conn.handle_text(&start_message(1));
        assert!(conn.is_generating());

        conn.handle_text(&start_message(1));
        assert_eq!(rx.recv().await, Some(ServerMessage::error(JOB_IN_PROGRESS)));

        api.gate.notify_one();
        assert_eq!(conn.join().await, Some(JobOutcome::Completed));
    }

    #[tokio::test]
    async fn test_cancel_stops_running_job() {
        let api = Arc::new(GatedStripe::default());
        let (mut conn, mut rx) = Connection::new(state(api.clone()));

        conn.handle_text(&start_message(5));
        api.entered.notified().await;
        conn.handle_text(r#"{"type":"CANCEL_GENERATION"}"#);
        // Let the in-flight call finish; the flag is seen before the next one
        api.gate.notify_one();

        let outcome = tokio::time::timeout(Duration::from_secs(5), conn.join())
            .await
            .unwrap();
        assert_eq!(outcome, Some(JobOutcome::Cancelled));

        let mut msgs = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            msgs.push(msg);
        }
        assert_eq!(
            msgs,
            vec![
                ServerMessage::ProgressUpdate {
                    generated: 1,
                    total: 5
                },
                ServerMessage::GenerationCancelled,
            ]
        );
    }

    #[tokio::test]
    async fn test_restart_after_job_finished() {
        let api = Arc::new(GatedStripe::default());
        let (mut conn, _rx) = Connection::new(state(api.clone()));

        conn.handle_text(&start_message(0));
        assert_eq!(conn.join().await, Some(JobOutcome::Completed));

        conn.handle_text(&start_message(1));
        api.gate.notify_one();
        assert_eq!(conn.join().await, Some(JobOutcome::Completed));
    }
}
