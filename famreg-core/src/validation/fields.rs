use chrono::NaiveDate;
use serde_json::Value;

pub const LANGUAGES: &[&str] = &["eng_UG", "cgg_UG", "xog_UG", "lug_UG"];
pub const MSG_TYPES: &[&str] = &["text"];
pub const MSG_RECEIVERS: &[&str] = &[
    "head_of_household",
    "mother_to_be",
    "family_member",
    "trusted_friend",
];
pub const LOSS_REASONS: &[&str] = &["miscarriage", "stillborn", "baby_died"];
pub const ID_TYPES: &[&str] = &["ugandan_id", "other"];

/// Structural UUID-v4 check: 36 characters, version digit `4` at index 14
/// and variant digit in `{8, 9, a, b}` at index 19.
pub fn is_uuid_shaped(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    chars.len() == 36 && chars[14] == '4' && matches!(chars[19], 'a' | 'b' | '8' | '9')
}

pub fn is_valid_uuid(value: &Value) -> bool {
    value.as_str().is_some_and(is_uuid_shaped)
}

/// Parse a `YYYYMMDD` date string.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?;
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

pub fn is_valid_date(value: &Value) -> bool {
    parse_date(value).is_some()
}

fn is_one_of(value: &Value, allowed: &[&str]) -> bool {
    value.as_str().is_some_and(|s| allowed.contains(&s))
}

pub fn is_valid_language(value: &Value) -> bool {
    is_one_of(value, LANGUAGES)
}

pub fn is_valid_msg_type(value: &Value) -> bool {
    is_one_of(value, MSG_TYPES)
}

pub fn is_valid_msg_receiver(value: &Value) -> bool {
    is_one_of(value, MSG_RECEIVERS)
}

pub fn is_valid_loss_reason(value: &Value) -> bool {
    is_one_of(value, LOSS_REASONS)
}

pub fn is_valid_id_type(value: &Value) -> bool {
    is_one_of(value, ID_TYPES)
}

// TODO: reject names containing non-letters once the accepted alphabet for
// local-language names is agreed.
pub fn is_valid_name(value: &Value) -> bool {
    value.is_string()
}

// TODO: check national id numbers against the NIN format.
pub fn is_valid_id_no(value: &Value) -> bool {
    value.is_string()
}

/// Semantic type of a registration data field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Date,
    Language,
    MsgType,
    MsgReceiver,
    LossReason,
    Name,
    IdType,
    IdNumber,
}

impl FieldKind {
    /// Kind of a known field name; `None` for fields that carry no rule.
    pub fn of(field: &str) -> Option<FieldKind> {
        let kind = match field {
            "hoh_id" | "receiver_id" | "operator_id" => FieldKind::Uuid,
            "last_period_date" | "baby_dob" | "mama_dob" => FieldKind::Date,
            "language" => FieldKind::Language,
            "msg_type" => FieldKind::MsgType,
            "msg_receiver" => FieldKind::MsgReceiver,
            "loss_reason" => FieldKind::LossReason,
            "hoh_name" | "hoh_surname" | "mama_name" | "mama_surname" => FieldKind::Name,
            "mama_id_type" => FieldKind::IdType,
            "mama_id_no" => FieldKind::IdNumber,
            _ => return None,
        };
        Some(kind)
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldKind::Uuid => is_valid_uuid(value),
            FieldKind::Date => is_valid_date(value),
            FieldKind::Language => is_valid_language(value),
            FieldKind::MsgType => is_valid_msg_type(value),
            FieldKind::MsgReceiver => is_valid_msg_receiver(value),
            FieldKind::LossReason => is_valid_loss_reason(value),
            FieldKind::Name => is_valid_name(value),
            FieldKind::IdType => is_valid_id_type(value),
            FieldKind::IdNumber => is_valid_id_no(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uuid_shape() {
        assert!(is_valid_uuid(&json!("mother00-9d89-4aa6-99ff-13c225365b5d")));
        assert!(is_valid_uuid(&json!("hoh00000-9d89-4aa6-b9ff-13c225365b5d")));
        // wrong version digit
        assert!(!is_valid_uuid(&json!("mother00-9d89-3aa6-99ff-13c225365b5d")));
        // wrong variant digit
        assert!(!is_valid_uuid(&json!("mother00-9d89-4aa6-c9ff-13c225365b5d")));
        assert!(!is_valid_uuid(&json!("mother00-9d89-4aa6-99ff-13c225365b5")));
        assert!(!is_valid_uuid(&json!(42)));
    }

    #[test]
    fn test_date() {
        assert!(is_valid_date(&json!("20240229")));
        assert!(!is_valid_date(&json!("20230229")));
        assert!(!is_valid_date(&json!("2024-01-01")));
        assert!(!is_valid_date(&json!("2024011")));
        assert!(!is_valid_date(&json!(20240101)));
        assert_eq!(
            parse_date(&json!("20240101")),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn test_enums() {
        assert!(is_valid_language(&json!("lug_UG")));
        assert!(!is_valid_language(&json!("fr_FR")));
        assert!(is_valid_msg_type(&json!("text")));
        assert!(!is_valid_msg_type(&json!("audio")));
        assert!(is_valid_msg_receiver(&json!("trusted_friend")));
        assert!(!is_valid_msg_receiver(&json!("neighbour")));
        assert!(is_valid_loss_reason(&json!("stillborn")));
        assert!(!is_valid_loss_reason(&json!("other")));
        assert!(is_valid_id_type(&json!("other")));
        assert!(!is_valid_id_type(&json!("passport")));
    }

    #[test]
    fn test_names_and_id_numbers_are_permissive() {
        assert!(is_valid_name(&json!("Sue")));
        assert!(is_valid_name(&json!("R2-D2")));
        assert!(!is_valid_name(&json!(null)));
        assert!(is_valid_id_no(&json!("CM12345")));
        assert!(!is_valid_id_no(&json!(12345)));
    }

    #[test]
    fn test_field_kinds() {
        assert_eq!(FieldKind::of("receiver_id"), Some(FieldKind::Uuid));
        assert_eq!(FieldKind::of("mama_dob"), Some(FieldKind::Date));
        assert_eq!(FieldKind::of("favourite_colour"), None);
        assert!(FieldKind::Language.accepts(&json!("eng_UG")));
    }
}
