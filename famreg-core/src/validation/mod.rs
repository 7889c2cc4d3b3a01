//! Registration validation
//!
//! 1. mother_id shape
//! 2. msg_receiver / identity consistency
//! 3. Schema classification
//! 4. Per-field and cross-field rules for the matched schema
//!
//! Validation is pure: it reads a registration and returns a
//! [`ValidationOutcome`] that the caller applies and persists.

pub mod fields;
pub mod receiver;
pub mod schema;

pub use receiver::{ReceiverConflict, check_receiver};
pub use schema::Schema;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fmt;

use crate::calendar::{is_registrable_week, pregnancy_week};
use crate::model::{Authority, Registration, Stage};
use fields::FieldKind;

pub const INVALID_MOTHER_ID: &str = "Invalid UUID mother_id";
pub const INVALID_COMBINATION: &str = "Invalid combination of fields";
pub const MAMA_DOB_REQUIRES_OTHER: &str = "mama_dob requires id_type other";
pub const MAMA_ID_NO_REQUIRES_UGANDAN_ID: &str = "mama_id_no requires id_type ugandan_id";
pub const LAST_PERIOD_OUT_OF_RANGE: &str = "last_period_date out of range";

/// Why a registration was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// mother_id is not UUID shaped.
    InvalidMotherId,
    ReceiverConflict(ReceiverConflict),
    /// No schema accepts this stage, authority and field set.
    NoSchemaMatch,
    /// Every failing field name or cross-field marker.
    InvalidFields(Vec<String>),
}

impl Rejection {
    /// Value stored under `data["invalid_fields"]`.
    pub fn to_value(&self) -> Value {
        match self {
            Rejection::InvalidFields(failures) => Value::from(failures.clone()),
            other => Value::from(other.to_string()),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidMotherId => f.write_str(INVALID_MOTHER_ID),
            Rejection::ReceiverConflict(conflict) => f.write_str(conflict.message()),
            Rejection::NoSchemaMatch => f.write_str(INVALID_COMBINATION),
            Rejection::InvalidFields(failures) => {
                write!(f, "Invalid fields: {}", failures.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid {
        schema: Schema,
        /// Gestational week, for prebirth schemas.
        preg_week: Option<i64>,
    },
    Invalid(Rejection),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid { .. })
    }
}

/// Validate a registration submitted by a source of the given authority.
pub fn validate(
    registration: &Registration,
    authority: Authority,
    today: NaiveDate,
) -> ValidationOutcome {
    if !fields::is_uuid_shaped(&registration.mother_id) {
        return ValidationOutcome::Invalid(Rejection::InvalidMotherId);
    }

    if let Some(conflict) = check_receiver(&registration.mother_id, &registration.data) {
        return ValidationOutcome::Invalid(Rejection::ReceiverConflict(conflict));
    }

    let Some(schema) = Schema::classify(registration.stage, authority, &registration.data) else {
        return ValidationOutcome::Invalid(Rejection::NoSchemaMatch);
    };

    let checked = check_fields(schema, &registration.data, today);
    if !checked.failures.is_empty() {
        return ValidationOutcome::Invalid(Rejection::InvalidFields(checked.failures));
    }

    let preg_week = match schema.stage() {
        Stage::Prebirth => checked.preg_week,
        Stage::Loss => None,
    };
    ValidationOutcome::Valid { schema, preg_week }
}

struct CheckedFields {
    failures: Vec<String>,
    preg_week: Option<i64>,
}

/// Run the field and cross-field rules for every field the schema requires.
fn check_fields(schema: Schema, data: &Map<String, Value>, today: NaiveDate) -> CheckedFields {
    let id_type = data.get("mama_id_type").and_then(|v| v.as_str());
    let mut failures = Vec::new();
    let mut preg_week = None;

    for &field in schema.required_fields() {
        let (Some(value), Some(kind)) = (data.get(field), FieldKind::of(field)) else {
            continue;
        };

        if !kind.accepts(value) {
            failures.push(field.to_string());
        } else if field == "mama_dob" && id_type != Some("other") {
            failures.push(MAMA_DOB_REQUIRES_OTHER.to_string());
        } else if field == "last_period_date"
            && let Some(lmp) = fields::parse_date(value)
        {
            let week = pregnancy_week(today, lmp);
            if is_registrable_week(week) {
                preg_week = Some(week);
            } else {
                failures.push(LAST_PERIOD_OUT_OF_RANGE.to_string());
            }
        }

        if field == "mama_id_no" && id_type != Some("ugandan_id") {
            failures.push(MAMA_ID_NO_REQUIRES_UGANDAN_ID.to_string());
        }
    }

    CheckedFields { failures, preg_week }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const MOTHER: &str = "mother00-9d89-4aa6-99ff-13c225365b5d";
    const HOH: &str = "hoh00000-9d89-4aa6-99ff-13c225365b5d";
    const OPERATOR: &str = "operator-9d89-4aa6-99ff-13c225365b5d";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn lmp_weeks_ago(weeks: i64) -> String {
        (today() - Duration::weeks(weeks)).format("%Y%m%d").to_string()
    }

    fn registration(stage: Stage, mother_id: &str, data: Value) -> Registration {
        Registration::new(
            "reg-1",
            stage,
            mother_id,
            "source-1",
            data.as_object().cloned().unwrap(),
        )
    }

    fn pbl_pre_data() -> Value {
        json!({
            "hoh_id": HOH,
            "receiver_id": HOH,
            "operator_id": OPERATOR,
            "language": "eng_UG",
            "msg_type": "text",
            "last_period_date": "20240101",
            "msg_receiver": "head_of_household"
        })
    }

    fn hw_pre_id_data() -> Value {
        json!({
            "hoh_id": HOH,
            "receiver_id": HOH,
            "operator_id": OPERATOR,
            "language": "lug_UG",
            "msg_type": "text",
            "last_period_date": lmp_weeks_ago(10),
            "msg_receiver": "head_of_household",
            "hoh_name": "Jomo",
            "hoh_surname": "Okello",
            "mama_name": "Sue",
            "mama_surname": "Nakato",
            "mama_id_type": "ugandan_id",
            "mama_id_no": "CM1234567"
        })
    }

    #[test]
    fn test_public_prebirth_is_valid() {
        let reg = registration(Stage::Prebirth, MOTHER, pbl_pre_data());
        let outcome = validate(&reg, Authority::Patient, today());

        // 2024-01-01 to 2024-06-01 is 152 days
        assert_eq!(
            outcome,
            ValidationOutcome::Valid {
                schema: Schema::PblPre,
                preg_week: Some(21)
            }
        );
    }

    #[test]
    fn test_bad_language_lists_only_language() {
        let mut data = pbl_pre_data();
        data["language"] = json!("fr_FR");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        assert_eq!(
            validate(&reg, Authority::Patient, today()),
            ValidationOutcome::Invalid(Rejection::InvalidFields(vec!["language".to_string()]))
        );
    }

    #[test]
    fn test_invalid_mother_id_wins_over_everything() {
        for mother_id in ["", "not-a-uuid", "mother00-9d89-5aa6-99ff-13c225365b5d"] {
            let reg = registration(Stage::Prebirth, mother_id, json!({"msg_receiver": "bogus"}));
            let outcome = validate(&reg, Authority::HwFull, today());
            assert_eq!(outcome, ValidationOutcome::Invalid(Rejection::InvalidMotherId));
            if let ValidationOutcome::Invalid(rejection) = outcome {
                assert_eq!(rejection.to_value(), json!("Invalid UUID mother_id"));
            }
        }
    }

    #[test]
    fn test_receiver_conflict_precedes_field_checks() {
        let mut data = pbl_pre_data();
        data["receiver_id"] = json!(MOTHER);
        data["language"] = json!("fr_FR");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        let outcome = validate(&reg, Authority::Patient, today());
        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(Rejection::ReceiverConflict(
                ReceiverConflict::HouseholdIsNotReceiver
            ))
        );
    }

    #[test]
    fn test_no_schema_match() {
        let mut data = pbl_pre_data();
        data.as_object_mut().unwrap().remove("operator_id");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        let outcome = validate(&reg, Authority::Patient, today());
        assert_eq!(outcome, ValidationOutcome::Invalid(Rejection::NoSchemaMatch));
        if let ValidationOutcome::Invalid(rejection) = outcome {
            assert_eq!(rejection.to_value(), json!("Invalid combination of fields"));
        }
    }

    #[test]
    fn test_health_worker_with_id() {
        let reg = registration(Stage::Prebirth, MOTHER, hw_pre_id_data());
        assert_eq!(
            validate(&reg, Authority::HwLimited, today()),
            ValidationOutcome::Valid {
                schema: Schema::HwPreId,
                preg_week: Some(10)
            }
        );
    }

    #[test]
    fn test_id_no_requires_ugandan_id() {
        let mut data = hw_pre_id_data();
        data["mama_id_type"] = json!("other");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        assert_eq!(
            validate(&reg, Authority::HwFull, today()),
            ValidationOutcome::Invalid(Rejection::InvalidFields(vec![
                MAMA_ID_NO_REQUIRES_UGANDAN_ID.to_string()
            ]))
        );
    }

    #[test]
    fn test_dob_requires_other_id_type() {
        let mut data = hw_pre_id_data();
        let obj = data.as_object_mut().unwrap();
        obj.remove("mama_id_no");
        obj.insert("mama_dob".to_string(), json!("19900512"));
        let reg = registration(Stage::Prebirth, MOTHER, data.clone());

        assert_eq!(
            validate(&reg, Authority::HwFull, today()),
            ValidationOutcome::Invalid(Rejection::InvalidFields(vec![
                MAMA_DOB_REQUIRES_OTHER.to_string()
            ]))
        );

        data["mama_id_type"] = json!("other");
        let reg = registration(Stage::Prebirth, MOTHER, data);
        assert!(matches!(
            validate(&reg, Authority::HwFull, today()),
            ValidationOutcome::Valid { schema: Schema::HwPreDob, .. }
        ));
    }

    #[test]
    fn test_id_and_dob_classifies_as_id() {
        let mut data = hw_pre_id_data();
        data["mama_dob"] = json!("19900512");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        assert!(matches!(
            validate(&reg, Authority::HwFull, today()),
            ValidationOutcome::Valid { schema: Schema::HwPreId, .. }
        ));
    }

    #[test]
    fn test_last_period_date_boundaries() {
        for (weeks, ok) in [(1, false), (2, true), (42, true), (43, false)] {
            let mut data = pbl_pre_data();
            data["last_period_date"] = json!(lmp_weeks_ago(weeks));
            let reg = registration(Stage::Prebirth, MOTHER, data);
            let outcome = validate(&reg, Authority::Advisor, today());

            if ok {
                assert_eq!(
                    outcome,
                    ValidationOutcome::Valid {
                        schema: Schema::PblPre,
                        preg_week: Some(weeks)
                    },
                    "{} weeks",
                    weeks
                );
            } else {
                assert_eq!(
                    outcome,
                    ValidationOutcome::Invalid(Rejection::InvalidFields(vec![
                        LAST_PERIOD_OUT_OF_RANGE.to_string()
                    ])),
                    "{} weeks",
                    weeks
                );
            }
        }
    }

    #[test]
    fn test_unparseable_date_reported_once() {
        let mut data = pbl_pre_data();
        data["last_period_date"] = json!("20241301");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        assert_eq!(
            validate(&reg, Authority::Patient, today()),
            ValidationOutcome::Invalid(Rejection::InvalidFields(vec![
                "last_period_date".to_string()
            ]))
        );
    }

    #[test]
    fn test_all_failures_are_listed() {
        let mut data = pbl_pre_data();
        data["operator_id"] = json!("nope");
        data["language"] = json!("fr_FR");
        data["msg_type"] = json!("voice");
        let reg = registration(Stage::Prebirth, MOTHER, data);

        assert_eq!(
            validate(&reg, Authority::Patient, today()),
            ValidationOutcome::Invalid(Rejection::InvalidFields(vec![
                "operator_id".to_string(),
                "language".to_string(),
                "msg_type".to_string(),
            ]))
        );
    }

    #[test]
    fn test_loss_has_no_pregnancy_week() {
        let reg = registration(
            Stage::Loss,
            MOTHER,
            json!({
                "hoh_id": HOH,
                "receiver_id": MOTHER,
                "operator_id": OPERATOR,
                "language": "cgg_UG",
                "msg_type": "text",
                "loss_reason": "miscarriage"
            }),
        );

        assert_eq!(
            validate(&reg, Authority::Patient, today()),
            ValidationOutcome::Valid {
                schema: Schema::PblLoss,
                preg_week: None
            }
        );
    }
}
