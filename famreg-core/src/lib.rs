pub mod calendar;
pub mod error;
pub mod messageset;
pub mod model;
pub mod provisioning;
pub mod task;
pub mod validation;

pub use error::{RegistrationError, Result};
pub use messageset::{MessagesetCatalog, MessagesetEntry, StageBasedPlanNamer};
pub use model::{Authority, Registration, Source, Stage, SubscriptionRequest};
pub use provisioning::{PlanNamer, ProvisioningEngine, ScheduleResolver, ScheduleSlot};
pub use task::{RegistrationStore, TaskStatus, validate_registration};
pub use validation::{Rejection, Schema, ValidationOutcome, validate};
