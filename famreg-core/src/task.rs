//! Validation task: load, validate, provision, persist.

use chrono::NaiveDate;
use std::fmt;

use crate::error::{RegistrationError, Result};
use crate::model::{Authority, Registration, SubscriptionRequest};
use crate::provisioning::{PlanNamer, ProvisioningEngine, ScheduleResolver};
use crate::validation::{self, ValidationOutcome};

/// Persistence the validation task relies on.
pub trait RegistrationStore {
    fn load(&self, id: &str) -> Result<Registration>;

    /// Persist a rejected registration.
    ///
    /// Saving with `validated = true` must only succeed if the stored row is
    /// not already validated, otherwise `RegistrationError::AlreadyValidated`.
    fn save(&self, registration: &Registration) -> Result<()>;

    /// Authority of the source a registration was submitted by.
    fn authority_of(&self, source_id: &str) -> Result<Authority>;

    /// Persist a validated registration together with its subscription
    /// request, as one unit.
    ///
    /// Nothing is written when the stored row is already validated
    /// (`RegistrationError::AlreadyValidated`) or when either write fails.
    fn complete_validation(
        &self,
        registration: &Registration,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionRequest>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Validated and enrolled with the stored subscription request.
    Success(SubscriptionRequest),
    Failure,
    /// The registration was validated by an earlier run; nothing was done.
    AlreadyValidated,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Success(_) => "Validation completed - Success",
            TaskStatus::Failure => "Validation completed - Failure",
            TaskStatus::AlreadyValidated => "Validation skipped - Already validated",
        }
    }

    pub fn subscription_request(&self) -> Option<&SubscriptionRequest> {
        match self {
            TaskStatus::Success(request) => Some(request),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validate a stored registration and, on success, create its subscription
/// request.
///
/// Rejections are recorded on the registration and reported as
/// [`TaskStatus::Failure`]. A registration is only stored as validated once
/// its subscription request has been built, so a provisioning error leaves it
/// unvalidated and the task can be dispatched again. Losing a race against a
/// concurrent run reports [`TaskStatus::AlreadyValidated`]; other store errors
/// are returned unchanged.
pub fn validate_registration<St, N, S>(
    store: &St,
    engine: &ProvisioningEngine<N, S>,
    registration_id: &str,
    today: NaiveDate,
) -> Result<TaskStatus>
where
    St: RegistrationStore + ?Sized,
    N: PlanNamer,
    S: ScheduleResolver,
{
    tracing::info!(registration_id = %registration_id, "Looking up the registration");
    let mut registration = store.load(registration_id)?;

    if registration.validated {
        tracing::info!(registration_id = %registration_id, "Registration already validated");
        return Ok(TaskStatus::AlreadyValidated);
    }

    let authority = store.authority_of(&registration.source)?;
    let outcome = validation::validate(&registration, authority, today);
    registration.apply(&outcome);

    match outcome {
        ValidationOutcome::Valid { schema, .. } => {
            let request = engine.provision(&registration, authority).inspect_err(|e| {
                tracing::error!(
                    registration_id = %registration_id,
                    reg_type = schema.name(),
                    error = %e,
                    "Provisioning failed; registration left unvalidated"
                );
            })?;
            let created = match store.complete_validation(&registration, &request) {
                Err(RegistrationError::AlreadyValidated { .. }) => {
                    return Ok(already_validated(registration_id));
                }
                other => other?,
            };
            tracing::info!(
                registration_id = %registration_id,
                reg_type = schema.name(),
                subscription_request = created.id.as_deref().unwrap_or(""),
                "Registration validated"
            );
            Ok(TaskStatus::Success(created))
        }
        ValidationOutcome::Invalid(rejection) => {
            match store.save(&registration) {
                Err(RegistrationError::AlreadyValidated { .. }) => {
                    return Ok(already_validated(registration_id));
                }
                other => other?,
            }
            tracing::info!(
                registration_id = %registration_id,
                reason = %rejection,
                "Registration rejected"
            );
            Ok(TaskStatus::Failure)
        }
    }
}

fn already_validated(registration_id: &str) -> TaskStatus {
    tracing::info!(
        registration_id = %registration_id,
        "Registration validated by a concurrent run"
    );
    TaskStatus::AlreadyValidated
}
