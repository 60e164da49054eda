use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::models::capability::ScopeType;
use crate::services::events::Event;

#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub url: url::Url,
    pub scope_type: ScopeType,
    pub scope_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'a str,
    workspace_id: Uuid,
    file_path: &'a str,
    data: &'a serde_json::Value,
    timestamp: chrono::DateTime<chrono::Utc>,
}

/// Fire-and-forget HTTP delivery of bus events to registered subscriptions.
/// Delivery failures are logged and never propagate back to the request
/// that triggered the emission; ordering across events is not guaranteed
/// since each delivery is spawned independently.
#[derive(Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
}

impl WebhookDispatcher {
    pub fn new(request_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builds with a plain timeout");

        Self {
            client,
            subscriptions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn register(&self, subscription: Subscription) {
        self.subscriptions.write().push(subscription);
    }

    pub fn unregister(&self, id: Uuid) {
        self.subscriptions.write().retain(|s| s.id != id);
    }

    pub fn trigger(&self, event: &Event) {
        let matching: Vec<Subscription> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.workspace_id == event.workspace_id)
            .filter(|s| matches_scope(s, &event.file_path))
            .cloned()
            .collect();

        if matching.is_empty() {
            return;
        }

        let payload = WebhookPayload {
            event: event.name,
            workspace_id: event.workspace_id,
            file_path: &event.file_path,
            data: &event.data,
            timestamp: event.timestamp,
        };
        let body = match serde_json::to_value(&payload) {
            Ok(v) => v,
            Err(err) => {
                tracing::error!(?err, "failed to serialize webhook payload");
                return;
            }
        };

        for subscription in matching {
            let client = self.client.clone();
            let body = body.clone();
            tokio::spawn(async move {
                let result = client.post(subscription.url.clone()).json(&body).send().await;
                if let Err(err) = result {
                    tracing::warn!(
                        ?err,
                        url = %subscription.url,
                        "webhook delivery failed"
                    );
                }
            });
        }
    }
}

fn matches_scope(subscription: &Subscription, file_path: &str) -> bool {
    match subscription.scope_type {
        ScopeType::Workspace => true,
        ScopeType::File => subscription.scope_path.as_deref() == Some(file_path),
        ScopeType::Folder => subscription
            .scope_path
            .as_deref()
            .is_some_and(|scope| crate::services::path::is_descendant_or_equal(scope, file_path)),
    }
}
