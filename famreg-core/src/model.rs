//! Registration records and the subscription requests they produce.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::validation::ValidationOutcome;

/// Life-event category a registration addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prebirth,
    Loss,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prebirth => "prebirth",
            Stage::Loss => "loss",
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prebirth" => Ok(Stage::Prebirth),
            "loss" => Ok(Stage::Loss),
            other => Err(format!("Unknown stage: '{}'", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trust classification of the source that submitted a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    HwLimited,
    HwFull,
    Patient,
    Advisor,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Authority::HwLimited => "hw_limited",
            Authority::HwFull => "hw_full",
            Authority::Patient => "patient",
            Authority::Advisor => "advisor",
        }
    }

    /// Health workers (limited or full) as opposed to the public.
    pub fn is_health_worker(&self) -> bool {
        matches!(self, Authority::HwLimited | Authority::HwFull)
    }
}

impl FromStr for Authority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hw_limited" => Ok(Authority::HwLimited),
            "hw_full" => Ok(Authority::HwFull),
            "patient" => Ok(Authority::Patient),
            "advisor" => Ok(Authority::Advisor),
            other => Err(format!("Unknown authority: '{}'", other)),
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A submitting party. Registrations reference it by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub authority: Authority,
}

/// One submitted registration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub stage: Stage,
    pub mother_id: String,
    /// Id of the submitting [`Source`].
    pub source: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Registration {
    pub fn new(
        id: impl Into<String>,
        stage: Stage,
        mother_id: impl Into<String>,
        source: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            stage,
            mother_id: mother_id.into(),
            source: source.into(),
            data,
            validated: false,
            created_at: None,
            updated_at: None,
        }
    }

    /// String value of a data field, if present and a string.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }

    /// Record a validation outcome on this registration.
    ///
    /// A successful outcome stores the derived fields, drops any earlier
    /// `invalid_fields` and flips `validated`; a rejection stores its reason
    /// under `invalid_fields`. `validated` is
    /// never reset once set.
    pub fn apply(&mut self, outcome: &ValidationOutcome) {
        match outcome {
            ValidationOutcome::Valid { schema, preg_week } => {
                self.data.remove("invalid_fields");
                self.data
                    .insert("reg_type".to_string(), Value::from(schema.name()));
                if let Some(week) = preg_week {
                    self.data.insert("preg_week".to_string(), Value::from(*week));
                }
                self.validated = true;
            }
            ValidationOutcome::Invalid(rejection) => {
                self.data
                    .insert("invalid_fields".to_string(), rejection.to_value());
            }
        }
    }
}

/// Instruction for the messaging service to enrol a contact on a messageset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub contact: String,
    pub messageset: i64,
    pub next_sequence_number: i64,
    pub lang: String,
    pub schedule: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}
