//! Turns a validated registration into a subscription request.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RegistrationError, Result};
use crate::model::{Authority, Registration, Stage, SubscriptionRequest};

/// Receiver assumed when the registration does not name one (loss flows).
pub const DEFAULT_RECEIVER: &str = "mother_to_be";

/// Where in a messageset a new subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub messageset_id: i64,
    pub schedule_id: i64,
    pub next_sequence_number: i64,
}

/// Names the messageset a registration should be enrolled on.
pub trait PlanNamer {
    fn short_name(&self, msg_receiver: &str, stage: Stage, authority: Authority) -> String;
}

/// Finds the messageset, schedule and starting message for a plan.
pub trait ScheduleResolver {
    fn resolve(&self, short_name: &str, weeks: i64) -> Result<ScheduleSlot>;
}

pub struct ProvisioningEngine<N, S> {
    namer: N,
    resolver: S,
}

impl<N: PlanNamer, S: ScheduleResolver> ProvisioningEngine<N, S> {
    pub fn new(namer: N, resolver: S) -> Self {
        Self { namer, resolver }
    }

    pub fn resolver(&self) -> &S {
        &self.resolver
    }

    /// Build the subscription request for a validated registration.
    ///
    /// The request is not persisted here.
    pub fn provision(
        &self,
        registration: &Registration,
        authority: Authority,
    ) -> Result<SubscriptionRequest> {
        let weeks = weeks_for(registration)?;
        let receiver = registration
            .data_str("msg_receiver")
            .unwrap_or(DEFAULT_RECEIVER);
        let short_name = self.namer.short_name(receiver, registration.stage, authority);
        let slot = self.resolver.resolve(&short_name, weeks)?;
        let lang = registration
            .data_str("language")
            .ok_or_else(|| RegistrationError::MissingField {
                field: "language".to_string(),
            })?;

        tracing::debug!(
            registration_id = %registration.id,
            short_name = %short_name,
            weeks,
            messageset = slot.messageset_id,
            next_sequence_number = slot.next_sequence_number,
            "Resolved subscription schedule"
        );

        Ok(SubscriptionRequest {
            id: None,
            contact: registration.mother_id.clone(),
            messageset: slot.messageset_id,
            next_sequence_number: slot.next_sequence_number,
            lang: lang.to_string(),
            schedule: slot.schedule_id,
            created_at: None,
        })
    }
}

/// Weeks into the plan: pregnancy week, else baby age. Loss registrations
/// carry neither and start at the beginning of their plan.
fn weeks_for(registration: &Registration) -> Result<i64> {
    for field in ["preg_week", "baby_age"] {
        if let Some(value) = registration.data.get(field) {
            return as_weeks(value).ok_or_else(|| RegistrationError::MissingField {
                field: field.to_string(),
            });
        }
    }
    match registration.stage {
        Stage::Loss => Ok(0),
        Stage::Prebirth => Err(RegistrationError::MissingField {
            field: "preg_week".to_string(),
        }),
    }
}

fn as_weeks(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};
    use std::cell::RefCell;

    struct Namer;

    impl PlanNamer for Namer {
        fn short_name(&self, msg_receiver: &str, stage: Stage, authority: Authority) -> String {
            format!("{}/{}/{}", stage, msg_receiver, authority)
        }
    }

    #[derive(Default)]
    struct RecordingResolver {
        calls: RefCell<Vec<(String, i64)>>,
    }

    impl ScheduleResolver for RecordingResolver {
        fn resolve(&self, short_name: &str, weeks: i64) -> Result<ScheduleSlot> {
            self.calls.borrow_mut().push((short_name.to_string(), weeks));
            Ok(ScheduleSlot {
                messageset_id: 7,
                schedule_id: 3,
                next_sequence_number: weeks.max(1),
            })
        }
    }

    fn registration(stage: Stage, data: Value) -> Registration {
        let data: Map<String, Value> = data.as_object().cloned().unwrap();
        Registration::new("reg-1", stage, "mother-1", "source-1", data)
    }

    #[test]
    fn test_prebirth_uses_pregnancy_week() {
        let engine = ProvisioningEngine::new(Namer, RecordingResolver::default());
        let reg = registration(
            Stage::Prebirth,
            json!({"preg_week": 15, "msg_receiver": "head_of_household", "language": "eng_UG"}),
        );

        let request = engine.provision(&reg, Authority::HwFull).unwrap();
        assert_eq!(
            request,
            SubscriptionRequest {
                id: None,
                contact: "mother-1".to_string(),
                messageset: 7,
                next_sequence_number: 15,
                lang: "eng_UG".to_string(),
                schedule: 3,
                created_at: None,
            }
        );
        assert_eq!(
            engine.resolver().calls.borrow().as_slice(),
            &[("prebirth/head_of_household/hw_full".to_string(), 15)]
        );
    }

    #[test]
    fn test_baby_age_when_no_pregnancy_week() {
        let engine = ProvisioningEngine::new(Namer, RecordingResolver::default());
        let reg = registration(
            Stage::Prebirth,
            json!({"baby_age": "6", "msg_receiver": "mother_to_be", "language": "xog_UG"}),
        );

        let request = engine.provision(&reg, Authority::Patient).unwrap();
        assert_eq!(request.next_sequence_number, 6);
    }

    #[test]
    fn test_loss_defaults_receiver_and_weeks() {
        let engine = ProvisioningEngine::new(Namer, RecordingResolver::default());
        let reg = registration(
            Stage::Loss,
            json!({"loss_reason": "miscarriage", "language": "eng_UG"}),
        );

        engine.provision(&reg, Authority::Patient).unwrap();
        assert_eq!(
            engine.resolver().calls.borrow().as_slice(),
            &[("loss/mother_to_be/patient".to_string(), 0)]
        );
    }

    #[test]
    fn test_prebirth_without_weeks_is_an_error() {
        let engine = ProvisioningEngine::new(Namer, RecordingResolver::default());
        let reg = registration(Stage::Prebirth, json!({"language": "eng_UG"}));

        assert!(matches!(
            engine.provision(&reg, Authority::Patient),
            Err(RegistrationError::MissingField { field }) if field == "preg_week"
        ));
    }
}
