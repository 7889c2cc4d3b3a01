use serde_json::{Map, Value};
use std::fmt;

/// Inconsistency between `msg_receiver` and the identities supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverConflict {
    HouseholdIsNotReceiver,
    MotherIsNotReceiver,
    ReceiverNotDistinct,
}

impl ReceiverConflict {
    pub fn message(&self) -> &'static str {
        match self {
            ReceiverConflict::HouseholdIsNotReceiver => "hoh_id should be the same as receiver_id",
            ReceiverConflict::MotherIsNotReceiver => "mother_id should be the same as receiver_id",
            ReceiverConflict::ReceiverNotDistinct => {
                "receiver_id should differ from hoh_id and mother_id"
            }
        }
    }
}

impl fmt::Display for ReceiverConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Check that the declared message receiver agrees with the ids supplied.
///
/// Only ids that are present are compared; a missing id is reported later
/// by schema classification. Unknown receivers are left to field validation.
pub fn check_receiver(mother_id: &str, data: &Map<String, Value>) -> Option<ReceiverConflict> {
    let receiver = data.get("msg_receiver").and_then(|v| v.as_str())?;
    let receiver_id = data.get("receiver_id");
    let hoh_id = data.get("hoh_id");
    let is_mother = |id: &Value| id.as_str() == Some(mother_id);

    match receiver {
        "head_of_household" => match (hoh_id, receiver_id) {
            (Some(hoh), Some(rec)) if hoh != rec => Some(ReceiverConflict::HouseholdIsNotReceiver),
            _ => None,
        },
        "mother_to_be" => match receiver_id {
            Some(rec) if !is_mother(rec) => Some(ReceiverConflict::MotherIsNotReceiver),
            _ => None,
        },
        "family_member" | "trusted_friend" => match receiver_id {
            Some(rec) if hoh_id == Some(rec) || is_mother(rec) => {
                Some(ReceiverConflict::ReceiverNotDistinct)
            }
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MOTHER: &str = "mother00-9d89-4aa6-99ff-13c225365b5d";
    const HOH: &str = "hoh00000-9d89-4aa6-99ff-13c225365b5d";
    const FRIEND: &str = "friend00-9d89-4aa6-99ff-13c225365b5d";

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_no_receiver_means_no_check() {
        assert_eq!(check_receiver(MOTHER, &data(json!({"hoh_id": HOH}))), None);
    }

    #[test]
    fn test_head_of_household() {
        let ok = data(json!({"msg_receiver": "head_of_household", "hoh_id": HOH, "receiver_id": HOH}));
        assert_eq!(check_receiver(MOTHER, &ok), None);

        let bad = data(json!({"msg_receiver": "head_of_household", "hoh_id": HOH, "receiver_id": MOTHER}));
        assert_eq!(
            check_receiver(MOTHER, &bad),
            Some(ReceiverConflict::HouseholdIsNotReceiver)
        );
    }

    #[test]
    fn test_mother_to_be() {
        let ok = data(json!({"msg_receiver": "mother_to_be", "hoh_id": HOH, "receiver_id": MOTHER}));
        assert_eq!(check_receiver(MOTHER, &ok), None);

        let bad = data(json!({"msg_receiver": "mother_to_be", "hoh_id": HOH, "receiver_id": HOH}));
        assert_eq!(
            check_receiver(MOTHER, &bad),
            Some(ReceiverConflict::MotherIsNotReceiver)
        );
    }

    #[test]
    fn test_family_and_friends_must_be_distinct() {
        for receiver in ["family_member", "trusted_friend"] {
            let ok = data(json!({"msg_receiver": receiver, "hoh_id": HOH, "receiver_id": FRIEND}));
            assert_eq!(check_receiver(MOTHER, &ok), None);

            let same_as_hoh = data(json!({"msg_receiver": receiver, "hoh_id": HOH, "receiver_id": HOH}));
            assert_eq!(
                check_receiver(MOTHER, &same_as_hoh),
                Some(ReceiverConflict::ReceiverNotDistinct)
            );

            let same_as_mother =
                data(json!({"msg_receiver": receiver, "hoh_id": HOH, "receiver_id": MOTHER}));
            assert_eq!(
                check_receiver(MOTHER, &same_as_mother),
                Some(ReceiverConflict::ReceiverNotDistinct)
            );
        }
    }

    #[test]
    fn test_message_text() {
        assert_eq!(
            ReceiverConflict::ReceiverNotDistinct.to_string(),
            "receiver_id should differ from hoh_id and mother_id"
        );
    }
}
