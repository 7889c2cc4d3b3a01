//! Stage-based messaging service client
//!
//! Used at startup to learn messageset ids, default schedules and how many
//! messages each schedule sends per week.

use famreg_core::{MessagesetCatalog, MessagesetEntry};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::MessagingSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteMessageset {
    pub id: i64,
    pub short_name: String,
    pub default_schedule: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSchedule {
    pub id: i64,
    /// Cron-style list such as `"1,4"`.
    pub day_of_week: String,
}

impl RemoteSchedule {
    pub fn messages_per_week(&self) -> i64 {
        self.day_of_week
            .split(',')
            .filter(|day| !day.trim().is_empty())
            .count()
            .max(1) as i64
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

pub struct MessagingClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl MessagingClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to build messaging client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, String> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Token {}", token));
        }
        let response = request
            .send()
            .await
            .map_err(|e| format!("Failed to fetch {}: {}", url, e))?;
        if !response.status().is_success() {
            return Err(format!("{} returned {}", url, response.status()));
        }
        response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response from {}: {}", url, e))
    }

    /// All messagesets, following pagination
    pub async fn messagesets(&self) -> Result<Vec<RemoteMessageset>, String> {
        let mut url = Some(format!("{}/messageset/", self.base_url));
        let mut messagesets = Vec::new();
        while let Some(current) = url {
            let page: Page<RemoteMessageset> = self.get_json(&current).await?;
            messagesets.extend(page.results);
            url = page.next;
        }
        Ok(messagesets)
    }

    pub async fn schedule(&self, id: i64) -> Result<RemoteSchedule, String> {
        self.get_json(&format!("{}/schedule/{}/", self.base_url, id))
            .await
    }

    /// Build catalog entries for every remote messageset.
    ///
    /// `start_week` is not known to the service, so it is taken from the
    /// configured entry with the same short name.
    pub async fn fetch_entries(
        &self,
        configured: &[MessagesetEntry],
    ) -> Result<Vec<MessagesetEntry>, String> {
        let messagesets = self.messagesets().await?;
        let mut per_week: HashMap<i64, i64> = HashMap::new();
        let mut entries = Vec::with_capacity(messagesets.len());

        for messageset in messagesets {
            let messages_per_week = match per_week.get(&messageset.default_schedule) {
                Some(count) => *count,
                None => {
                    let schedule = self.schedule(messageset.default_schedule).await?;
                    let count = schedule.messages_per_week();
                    per_week.insert(schedule.id, count);
                    count
                }
            };
            entries.push(merge_entry(configured, messageset, messages_per_week));
        }
        Ok(entries)
    }
}

fn merge_entry(
    configured: &[MessagesetEntry],
    remote: RemoteMessageset,
    messages_per_week: i64,
) -> MessagesetEntry {
    let start_week = configured
        .iter()
        .find(|entry| entry.short_name == remote.short_name)
        .map(|entry| entry.start_week)
        .unwrap_or_default();
    MessagesetEntry {
        short_name: remote.short_name,
        messageset_id: remote.id,
        schedule_id: remote.default_schedule,
        messages_per_week,
        start_week,
    }
}

/// Catalog from configuration, refreshed from the messaging service when one
/// is configured. A failed refresh keeps the configured entries.
pub async fn load_catalog(settings: &MessagingSettings) -> MessagesetCatalog {
    let mut catalog = MessagesetCatalog::from_entries(settings.messagesets.iter().cloned());

    let Some(url) = settings.url.as_deref() else {
        return catalog;
    };

    let fetched = match MessagingClient::new(
        url,
        settings.token.clone(),
        Duration::from_secs(settings.timeout_secs),
    ) {
        Ok(client) => client.fetch_entries(&settings.messagesets).await,
        Err(e) => Err(e),
    };

    match fetched {
        Ok(entries) => {
            tracing::info!(url = %url, count = entries.len(), "Loaded messagesets");
            for entry in entries {
                catalog.add_entry(entry);
            }
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Using configured messagesets only");
        }
    }
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_per_week() {
        let schedule = |days: &str| RemoteSchedule {
            id: 1,
            day_of_week: days.to_string(),
        };
        assert_eq!(schedule("1").messages_per_week(), 1);
        assert_eq!(schedule("1,4").messages_per_week(), 2);
        assert_eq!(schedule("1,3,5").messages_per_week(), 3);
        assert_eq!(schedule("").messages_per_week(), 1);
    }

    #[test]
    fn test_merge_keeps_configured_start_week() {
        let configured = vec![MessagesetEntry {
            short_name: "prebirth.mother_to_be.patient".to_string(),
            messageset_id: 99,
            schedule_id: 99,
            messages_per_week: 1,
            start_week: 4,
        }];
        let remote = RemoteMessageset {
            id: 3,
            short_name: "prebirth.mother_to_be.patient".to_string(),
            default_schedule: 7,
        };

        let entry = merge_entry(&configured, remote, 2);
        assert_eq!(entry.messageset_id, 3);
        assert_eq!(entry.schedule_id, 7);
        assert_eq!(entry.messages_per_week, 2);
        assert_eq!(entry.start_week, 4);
    }

    #[test]
    fn test_page_parsing() {
        let page: Page<RemoteMessageset> = serde_json::from_value(serde_json::json!({
            "count": 1,
            "next": null,
            "previous": null,
            "results": [{"id": 1, "short_name": "loss.mother_to_be.patient", "default_schedule": 2, "notes": ""}]
        }))
        .unwrap();
        assert!(page.next.is_none());
        assert_eq!(page.results[0].default_schedule, 2);
    }

    #[tokio::test]
    async fn test_load_catalog_without_service() {
        let settings = MessagingSettings {
            messagesets: vec![MessagesetEntry {
                short_name: "loss.mother_to_be.patient".to_string(),
                messageset_id: 5,
                schedule_id: 6,
                messages_per_week: 1,
                start_week: 0,
            }],
            ..Default::default()
        };
        let catalog = load_catalog(&settings).await;
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("loss.mother_to_be.patient").is_some());
    }
}
