use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Authority, Stage};

/// Fields every registration shape requires.
pub const GENERAL_FIELDS: &[&str] = &["hoh_id", "receiver_id", "operator_id", "language", "msg_type"];

const HW_PRE_ID_FIELDS: &[&str] = &[
    "hoh_id",
    "receiver_id",
    "operator_id",
    "language",
    "msg_type",
    "last_period_date",
    "msg_receiver",
    "hoh_name",
    "hoh_surname",
    "mama_name",
    "mama_surname",
    "mama_id_type",
    "mama_id_no",
];

const HW_PRE_DOB_FIELDS: &[&str] = &[
    "hoh_id",
    "receiver_id",
    "operator_id",
    "language",
    "msg_type",
    "last_period_date",
    "msg_receiver",
    "hoh_name",
    "hoh_surname",
    "mama_name",
    "mama_surname",
    "mama_id_type",
    "mama_dob",
];

const PBL_PRE_FIELDS: &[&str] = &[
    "hoh_id",
    "receiver_id",
    "operator_id",
    "language",
    "msg_type",
    "last_period_date",
    "msg_receiver",
];

const PBL_LOSS_FIELDS: &[&str] = &[
    "hoh_id",
    "receiver_id",
    "operator_id",
    "language",
    "msg_type",
    "loss_reason",
];

const HEALTH_WORKERS: &[Authority] = &[Authority::HwLimited, Authority::HwFull];
const PUBLIC: &[Authority] = &[Authority::Patient, Authority::Advisor];

/// A recognised registration shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Health worker, prebirth, mother identified by national id.
    HwPreId,
    /// Health worker, prebirth, mother identified by date of birth.
    HwPreDob,
    /// Public prebirth.
    PblPre,
    /// Public loss.
    PblLoss,
}

impl Schema {
    /// Classification priority. The first matching schema wins.
    pub const ALL: [Schema; 4] = [
        Schema::HwPreId,
        Schema::HwPreDob,
        Schema::PblPre,
        Schema::PblLoss,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Schema::HwPreId => "hw_pre_id",
            Schema::HwPreDob => "hw_pre_dob",
            Schema::PblPre => "pbl_pre",
            Schema::PblLoss => "pbl_loss",
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Schema::HwPreId | Schema::HwPreDob | Schema::PblPre => Stage::Prebirth,
            Schema::PblLoss => Stage::Loss,
        }
    }

    pub fn authorities(&self) -> &'static [Authority] {
        match self {
            Schema::HwPreId | Schema::HwPreDob => HEALTH_WORKERS,
            Schema::PblPre | Schema::PblLoss => PUBLIC,
        }
    }

    /// Required fields, general fields first.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Schema::HwPreId => HW_PRE_ID_FIELDS,
            Schema::HwPreDob => HW_PRE_DOB_FIELDS,
            Schema::PblPre => PBL_PRE_FIELDS,
            Schema::PblLoss => PBL_LOSS_FIELDS,
        }
    }

    /// Whether this schema applies to a record. Extra fields are ignored.
    pub fn matches(&self, stage: Stage, authority: Authority, data: &Map<String, Value>) -> bool {
        self.stage() == stage
            && self.authorities().contains(&authority)
            && self
                .required_fields()
                .iter()
                .all(|field| data.contains_key(*field))
    }

    /// Select the first schema, in priority order, that matches the record.
    pub fn classify(stage: Stage, authority: Authority, data: &Map<String, Value>) -> Option<Schema> {
        Self::ALL
            .into_iter()
            .find(|schema| schema.matches(stage, authority, data))
    }
}
