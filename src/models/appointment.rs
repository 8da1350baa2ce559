use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;

use super::{Consultant, Identified, Ref, Service, SlotTime};

/// Canonical appointment status.
///
/// Upstream still emits a few legacy spellings; they are folded into the
/// canonical variants on decode. Unknown values pass through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    Other(String),
}

impl AppointmentStatus {
    pub fn normalize(raw: &str) -> Self {
        match raw {
            "pending" => AppointmentStatus::Pending,
            "confirmed" | "confirm" => AppointmentStatus::Confirmed,
            "completed" | "complete" => AppointmentStatus::Completed,
            "cancelled" => AppointmentStatus::Cancelled,
            "rescheduled" => AppointmentStatus::Rescheduled,
            other => AppointmentStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Rescheduled => "rescheduled",
            AppointmentStatus::Other(raw) => raw,
        }
    }
}

impl From<Option<String>> for AppointmentStatus {
    fn from(raw: Option<String>) -> Self {
        raw.map(|s| AppointmentStatus::normalize(&s)).unwrap_or_default()
    }
}

impl From<AppointmentStatus> for String {
    fn from(status: AppointmentStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const CONSULTANT_UNAVAILABLE: &str = "Consultant unavailable";
pub const SERVICE_UNAVAILABLE: &str = "Service unavailable";

/// Appointment as returned by the booking API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// `None` once the consultant has been deleted upstream.
    #[serde(rename = "consultant_id", alias = "consultantId", default)]
    pub consultant: Option<Ref<Consultant>>,

    #[serde(rename = "service_id", alias = "serviceId", default)]
    pub service: Option<Ref<Service>>,

    #[serde(rename = "slotTime_id", alias = "slot_time_id", alias = "slotTimeId", default)]
    pub slot: Option<Ref<SlotTime>>,

    #[serde(rename = "dateBooking", alias = "date_booking")]
    pub date_booking: DateTime<Utc>,

    #[serde(default)]
    pub status: AppointmentStatus,

    #[serde(rename = "hasFeedback", alias = "has_feedback", default)]
    pub has_feedback: bool,

    #[serde(rename = "isRescheduled", alias = "is_rescheduled", default)]
    pub is_rescheduled: bool,

    #[serde(rename = "meetingLink", alias = "meeting_link", default)]
    pub meeting_link: Option<String>,
}

impl Appointment {
    /// Start of the session: the populated slot's start, else the booking date.
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.populated_slot()
            .map(|slot| slot.start_time)
            .unwrap_or(self.date_booking)
    }

    pub fn consultant_id(&self) -> Option<&str> {
        self.consultant.as_ref().map(Ref::id)
    }

    pub fn service_id(&self) -> Option<&str> {
        self.service.as_ref().map(Ref::id)
    }

    pub fn slot_id(&self) -> Option<&str> {
        self.slot.as_ref().map(Ref::id)
    }

    pub fn consultant_name(&self) -> Option<&str> {
        self.consultant
            .as_ref()
            .and_then(Ref::populated)
            .map(|c| c.name.as_str())
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service
            .as_ref()
            .and_then(Ref::populated)
            .map(|s| s.name.as_str())
    }

    fn populated_slot(&self) -> Option<&SlotTime> {
        self.slot.as_ref().and_then(Ref::populated)
    }

    /// Feedback may be left once, for a completed appointment, within
    /// `window` of the booking date.
    pub fn can_review(&self, has_feedback: bool, now: DateTime<Utc>, window: Duration) -> bool {
        self.status == AppointmentStatus::Completed
            && !has_feedback
            && !self.has_feedback
            && now < self.date_booking + window
    }

    /// A confirmed appointment may be moved once, and only while it starts at
    /// least `lead` from now.
    pub fn can_reschedule(&self, now: DateTime<Utc>, lead: Duration) -> bool {
        self.status == AppointmentStatus::Confirmed
            && !self.is_rescheduled
            && self.starts_at() - now >= lead
    }

    /// Case-insensitive substring match over consultant and service names.
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [self.consultant_name(), self.service_name()]
            .into_iter()
            .flatten()
            .any(|name| name.to_lowercase().contains(&needle))
    }
}

impl Identified for Appointment {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Appointment row as rendered by the list and detail views.
#[derive(Debug, Serialize, JsonSchema)]
pub struct AppointmentView {
    pub id: String,
    pub consultant_id: Option<String>,
    pub consultant_name: Option<String>,
    /// Name to render; a placeholder when the consultant is gone.
    pub consultant_label: String,
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub service_label: String,
    pub slot_id: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub date_booking: DateTime<Utc>,
    pub status: String,
    pub has_feedback: bool,
    pub is_rescheduled: bool,
    pub meeting_link: Option<String>,
    pub can_review: bool,
    pub can_reschedule: bool,
}

impl AppointmentView {
    pub fn build(
        appointment: &Appointment,
        now: DateTime<Utc>,
        review_window: Duration,
        reschedule_lead: Duration,
    ) -> Self {
        AppointmentView {
            id: appointment.id.clone(),
            consultant_id: appointment.consultant_id().map(str::to_string),
            consultant_name: appointment.consultant_name().map(str::to_string),
            consultant_label: appointment
                .consultant_name()
                .unwrap_or(CONSULTANT_UNAVAILABLE)
                .to_string(),
            service_id: appointment.service_id().map(str::to_string),
            service_name: appointment.service_name().map(str::to_string),
            service_label: appointment
                .service_name()
                .unwrap_or(SERVICE_UNAVAILABLE)
                .to_string(),
            slot_id: appointment.slot_id().map(str::to_string),
            starts_at: appointment.starts_at(),
            ends_at: appointment.populated_slot().map(|slot| slot.end_time),
            date_booking: appointment.date_booking,
            status: appointment.status.to_string(),
            has_feedback: appointment.has_feedback,
            is_rescheduled: appointment.is_rescheduled,
            meeting_link: appointment.meeting_link.clone(),
            can_review: appointment.can_review(false, now, review_window),
            can_reschedule: appointment.can_reschedule(now, reschedule_lead),
        }
    }
}

/// Body of the upstream reschedule call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescheduleRequest {
    pub appointment_id: String,
    pub new_slot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_consultant_id: Option<String>,
}
