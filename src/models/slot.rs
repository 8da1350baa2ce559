use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

use super::Identified;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Booked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlotTime {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(rename = "consultant_id", alias = "consultantId", default)]
    pub consultant_id: String,

    #[serde(alias = "startTime")]
    pub start_time: DateTime<Utc>,

    #[serde(alias = "endTime")]
    pub end_time: DateTime<Utc>,

    pub status: SlotStatus,
}

impl SlotTime {
    pub fn is_bookable(&self, now: DateTime<Utc>) -> bool {
        self.status == SlotStatus::Available && self.start_time > now
    }
}

impl Identified for SlotTime {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Body of the upstream slot status transition.
#[derive(Debug, Serialize)]
pub struct SlotStatusUpdate<'a> {
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
}
