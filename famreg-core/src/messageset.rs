//! Messageset catalog and plan naming.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{RegistrationError, Result};
use crate::model::{Authority, Stage};
use crate::provisioning::{PlanNamer, ScheduleResolver, ScheduleSlot};

/// One messageset known to the messaging service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesetEntry {
    pub short_name: String,
    pub messageset_id: i64,
    pub schedule_id: i64,
    #[serde(default = "default_messages_per_week")]
    pub messages_per_week: i64,
    /// Week the first message of the set corresponds to.
    #[serde(default)]
    pub start_week: i64,
}

fn default_messages_per_week() -> i64 {
    1
}

impl MessagesetEntry {
    /// Sequence number of the first message for someone `weeks` in.
    ///
    /// Never below 1.
    pub fn sequence_for_week(&self, weeks: i64) -> i64 {
        ((weeks - self.start_week) * self.messages_per_week + 1).max(1)
    }
}

/// Registry of messagesets by short name.
#[derive(Debug, Clone, Default)]
pub struct MessagesetCatalog {
    entries: HashMap<String, MessagesetEntry>,
}

impl MessagesetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = MessagesetEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add_entry(entry);
        }
        catalog
    }

    /// Add or replace an entry
    pub fn add_entry(&mut self, entry: MessagesetEntry) {
        self.entries.insert(entry.short_name.clone(), entry);
    }

    pub fn get(&self, short_name: &str) -> Option<&MessagesetEntry> {
        self.entries.get(short_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ScheduleResolver for MessagesetCatalog {
    fn resolve(&self, short_name: &str, weeks: i64) -> Result<ScheduleSlot> {
        let entry = self
            .get(short_name)
            .ok_or_else(|| RegistrationError::UnknownMessageset {
                short_name: short_name.to_string(),
            })?;
        Ok(ScheduleSlot {
            messageset_id: entry.messageset_id,
            schedule_id: entry.schedule_id,
            next_sequence_number: entry.sequence_for_week(weeks),
        })
    }
}

/// Names plans `<stage>.<receiver>.<authority>`, e.g.
/// `prebirth.head_of_household.hw_full`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageBasedPlanNamer;

impl PlanNamer for StageBasedPlanNamer {
    fn short_name(&self, msg_receiver: &str, stage: Stage, authority: Authority) -> String {
        format!("{}.{}.{}", stage, msg_receiver, authority)
    }
}
