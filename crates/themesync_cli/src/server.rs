//! Webhook endpoint.
//!
//! Deliveries are authenticated and routed synchronously; the resulting
//! actions run in the background so GitHub gets its answer well within the
//! delivery timeout.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use themesync::webhook::{Action, RoutingConfig, WebhookEvent, route_event, verify_signature};

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Receives the actions routed from an accepted delivery.
#[async_trait::async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn handle(&self, event: WebhookEvent, actions: Vec<Action>);
}

/// Shared state of the webhook server.
pub struct AppState {
    secret: Vec<u8>,
    routing: RoutingConfig,
    handler: Arc<dyn DeliveryHandler>,
}

impl AppState {
    pub fn new(
        secret: impl Into<Vec<u8>>,
        routing: RoutingConfig,
        handler: Arc<dyn DeliveryHandler>,
    ) -> Self {
        Self {
            secret: secret.into(),
            routing,
            handler,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/health", get(health_check))
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening for webhooks on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(crate::shutdown::shutdown_signal())
        .await
}

async fn health_check() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let delivery = header(&headers, DELIVERY_HEADER).unwrap_or("-").to_string();

    if let Err(e) = verify_signature(&state.secret, &body, header(&headers, SIGNATURE_HEADER)) {
        tracing::warn!(delivery = %delivery, "Rejected delivery: {}", e);
        return (StatusCode::UNAUTHORIZED, e.to_string());
    }

    let Some(kind) = header(&headers, EVENT_HEADER) else {
        return (StatusCode::BAD_REQUEST, "Missing event header".to_string());
    };
    let event = match WebhookEvent::parse(kind, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(delivery = %delivery, event = kind, "Rejected delivery: {}", e);
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    if matches!(event, WebhookEvent::Ping) {
        return (StatusCode::OK, "pong".to_string());
    }

    let actions = route_event(&event, &state.routing);
    if actions.is_empty() {
        tracing::debug!(delivery = %delivery, event = event.kind(), "Nothing to do");
        return (StatusCode::OK, "ignored".to_string());
    }

    tracing::info!(
        delivery = %delivery,
        event = event.kind(),
        actions = actions.len(),
        "Accepted delivery"
    );
    let handler = Arc::clone(&state.handler);
    tokio::spawn(async move { handler.handle(event, actions).await });
    (StatusCode::ACCEPTED, "accepted".to_string())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use themesync::Branch;
    use themesync::webhook::sign;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;

    const SECRET: &str = "It's a Secret to Everybody";

    struct Recorder(mpsc::UnboundedSender<Vec<Action>>);

    #[async_trait::async_trait]
    impl DeliveryHandler for Recorder {
        async fn handle(&self, _event: WebhookEvent, actions: Vec<Action>) {
            let _ = self.0.send(actions);
        }
    }

    fn app() -> (Router, mpsc::UnboundedReceiver<Vec<Action>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new(SECRET, RoutingConfig::default(), Arc::new(Recorder(tx)));
        (router(state), rx)
    }

    fn delivery(event: &str, body: &str, signature: Option<String>) -> Request<Body> {
        let mut request = Request::post("/webhook").header(EVENT_HEADER, event);
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        request.body(Body::from(body.to_string())).unwrap()
    }

    fn signed(event: &str, body: &str) -> Request<Body> {
        delivery(event, body, Some(sign(SECRET.as_bytes(), body.as_bytes()).unwrap()))
    }

    fn push_body(branch: &str, message: &str) -> String {
        serde_json::json!({
            "ref": format!("refs/heads/{branch}"),
            "after": "abc123",
            "head_commit": { "message": message },
            "repository": { "name": "theme", "owner": { "login": "acme" } },
            "installation": { "id": 7 },
        })
        .to_string()
    }

    #[tokio::test]
    async fn unsigned_delivery_is_unauthorized() {
        let (app, _rx) = app();
        let response = app
            .oneshot(delivery("push", &push_body("production", "x"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_signature_is_unauthorized() {
        let (app, _rx) = app();
        let body = push_body("production", "x");
        let forged = sign(b"other secret", body.as_bytes()).unwrap();
        let response = app
            .oneshot(delivery("push", &body, Some(forged)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (app, _rx) = app();
        let response = app.oneshot(signed("ping", "{}")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_payload_is_bad_request() {
        let (app, _rx) = app();
        let response = app.oneshot(signed("push", "{\"ref\":")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_commits_are_ignored() {
        let (app, mut rx) = app();
        let body = push_body("production", "Update theme [themesync]");
        let response = app.oneshot(signed("push", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn production_push_is_dispatched() {
        let (app, mut rx) = app();
        let body = push_body("production", "Fix header");
        let response = app.oneshot(signed("push", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let actions = rx.recv().await.unwrap();
        assert_eq!(actions.len(), 2);
        assert!(matches!(
            &actions[0],
            Action::Sync(sync) if sync.destination == Branch::SgcProduction
        ));
        assert!(matches!(
            actions[1],
            Action::Rebase { branch: Branch::Staging, .. }
        ));
    }

    #[tokio::test]
    async fn health_check_responds() {
        let (app, _rx) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
