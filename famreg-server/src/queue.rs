//! Validation task queue
//!
//! A single consumer runs registrations through validation one at a time, so
//! a registration is never validated by two workers at once. Each stored
//! subscription request is announced as `subscriptionrequest.added`.

use chrono::Utc;
use famreg_core::validate_registration;
use famreg_store::SqliteStore;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Engine;
use crate::webhook::{WebhookEvent, WebhookManager};

#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl TaskQueue {
    /// Start the consumer task and return the queue feeding it.
    pub fn spawn(
        store: Arc<SqliteStore>,
        engine: Arc<Engine>,
        webhooks: Arc<WebhookManager>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let handle = tokio::spawn(async move {
            while let Some(registration_id) = rx.recv().await {
                let store = store.clone();
                let engine = engine.clone();
                let id = registration_id.clone();
                let result = tokio::task::spawn_blocking(move || {
                    validate_registration(store.as_ref(), engine.as_ref(), &id, Utc::now().date_naive())
                })
                .await;

                match result {
                    Ok(Ok(status)) => {
                        tracing::info!(
                            registration_id = %registration_id,
                            status = %status,
                            "Validation task finished"
                        );
                        if let Some(request) = status.subscription_request() {
                            webhooks.trigger(WebhookEvent::SubscriptionRequestAdded, json!(request));
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::error!(
                            registration_id = %registration_id,
                            error = %e,
                            "Validation task failed"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            registration_id = %registration_id,
                            error = %e,
                            "Validation task panicked"
                        );
                    }
                }
            }
            tracing::info!("Validation queue closed");
        });

        (Self { tx }, handle)
    }

    /// Queue a registration for validation. Returns false if the consumer
    /// has stopped.
    pub fn enqueue(&self, registration_id: impl Into<String>) -> bool {
        let registration_id = registration_id.into();
        match self.tx.send(registration_id) {
            Ok(()) => true,
            Err(mpsc::error::SendError(id)) => {
                tracing::error!(registration_id = %id, "Validation queue is closed");
                false
            }
        }
    }
}
