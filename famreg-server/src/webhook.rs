use crate::config::WebhookSettings;
use famreg_store::SqliteStore;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Webhook event types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    RegistrationAdded,
    SubscriptionRequestAdded,
}

impl WebhookEvent {
    pub const ALL: [WebhookEvent; 2] = [
        WebhookEvent::RegistrationAdded,
        WebhookEvent::SubscriptionRequestAdded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEvent::RegistrationAdded => "registration.added",
            WebhookEvent::SubscriptionRequestAdded => "subscriptionrequest.added",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }
}

/// Body posted to a hook target.
pub fn hook_payload(event: WebhookEvent, target: &str, data: &Value) -> Value {
    json!({
        "hook": {
            "event": event.as_str(),
            "target": target,
        },
        "data": data,
    })
}

/// Webhook manager
///
/// Targets are the configured endpoints (when enabled) plus hooks registered
/// through the API.
pub struct WebhookManager {
    settings: WebhookSettings,
    client: reqwest::Client,
    store: Arc<SqliteStore>,
}

impl WebhookManager {
    pub fn new(settings: WebhookSettings, store: Arc<SqliteStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build webhook client, using defaults");
                reqwest::Client::new()
            });
        Self {
            settings,
            client,
            store,
        }
    }

    /// Endpoints subscribed to an event
    pub fn targets(&self, event: WebhookEvent) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        if self.settings.enabled {
            targets.extend(
                self.settings
                    .endpoints
                    .iter()
                    .filter(|ep| ep.events.iter().any(|e| e == event.as_str()))
                    .map(|ep| ep.url.clone()),
            );
        }

        match self.store.list_hooks(Some(event.as_str())) {
            Ok(hooks) => {
                for hook in hooks {
                    if !targets.contains(&hook.target) {
                        targets.push(hook.target);
                    }
                }
            }
            Err(e) => {
                tracing::error!(event = event.as_str(), error = %e, "Failed to load hooks");
            }
        }
        targets
    }

    /// Trigger webhook for an event.
    ///
    /// Delivery runs in the background, once per target, and failures are
    /// only logged.
    pub fn trigger(&self, event: WebhookEvent, data: Value) {
        let targets = self.targets(event);
        if targets.is_empty() {
            return;
        }

        let client = self.client.clone();
        let authorization = format!("Token {}", self.settings.auth_token);
        tokio::spawn(async move {
            for target in targets {
                let request = client
                    .post(&target)
                    .header(reqwest::header::AUTHORIZATION, &authorization)
                    .json(&hook_payload(event, &target, &data));

                match request.send().await {
                    Ok(response) => {
                        tracing::info!(
                            url = %target,
                            event = event.as_str(),
                            status = %response.status(),
                            "Webhook delivered"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            url = %target,
                            event = event.as_str(),
                            error = %e,
                            "Failed to send webhook"
                        );
                    }
                }
            }
        });
    }
}
