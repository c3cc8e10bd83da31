use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use checkout_api::{
    client::{ConfirmationResult, FinalizeRequest, OrderClient},
    config::AppConfig,
    errors::CheckoutError,
    events::EventSender,
    intent::{CheckoutScope, InMemoryIntentStore, IntentStore},
    AppState,
};

/// Scripted order backend double. Records every finalize request and
/// answers with a fixed outcome.
pub struct ScriptedBackend {
    calls: AtomicUsize,
    requests: Mutex<Vec<Value>>,
    outcome: Result<i64, String>,
    delay: Option<std::time::Duration>,
}

impl ScriptedBackend {
    pub fn succeeding(order_id: i64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            outcome: Ok(order_id),
            delay: None,
        })
    }

    /// A succeeding backend whose finalize call takes a while, wide
    /// enough a window for a racing request to land inside it.
    pub fn succeeding_after(order_id: i64, delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            outcome: Ok(order_id),
            delay: Some(delay),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            outcome: Err(message.to_string()),
            delay: None,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<Value> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl OrderClient for ScriptedBackend {
    async fn finalize(
        &self,
        request: &FinalizeRequest,
    ) -> Result<ConfirmationResult, CheckoutError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(request).unwrap());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.outcome {
            Ok(order_id) => Ok(ConfirmationResult {
                order_id: *order_id,
            }),
            Err(message) => Err(CheckoutError::ConfirmationFailed(message.clone())),
        }
    }
}

/// In-process application harness.
pub struct TestApp {
    router: Router,
    pub store: Arc<InMemoryIntentStore>,
    pub backend: Arc<ScriptedBackend>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub fn with_backend(backend: Arc<ScriptedBackend>) -> Self {
        let cfg = AppConfig::new("127.0.0.1", 18080, "test", "http://localhost:9000/api");
        let store = Arc::new(InMemoryIntentStore::new());

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_task = tokio::spawn(checkout_api::events::process_events(event_rx));

        let state = Arc::new(AppState::new(
            cfg,
            store.clone(),
            backend.clone(),
            EventSender::new(event_tx),
        ));

        Self {
            router: checkout_api::app_router(state),
            store,
            backend,
            _event_task: event_task,
        }
    }

    pub fn new() -> Self {
        Self::with_backend(ScriptedBackend::succeeding(501))
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }

    pub async fn intent_exists(&self, scope: &CheckoutScope) -> bool {
        self.store.exists(scope).await.unwrap()
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
