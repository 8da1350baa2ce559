use log::warn;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::models::{Appointment, AppointmentStatus, Feedback};
use crate::services::{ApiClientError, ConsultApi};

/// Status filter from the list tabs. `all` or nothing means no filter; any
/// other value is normalized the same way upstream statuses are.
pub fn status_filter(raw: Option<&str>) -> Option<AppointmentStatus> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(AppointmentStatus::normalize(&raw.to_lowercase())),
    }
}

pub fn filter_appointments<'a>(
    appointments: &'a [Appointment],
    status: Option<&AppointmentStatus>,
    search: Option<&str>,
) -> Vec<&'a Appointment> {
    appointments
        .iter()
        .filter(|a| status.is_none_or(|s| &a.status == s))
        .filter(|a| search.is_none_or(|needle| a.matches_search(needle)))
        .collect()
}

/// Appointment counts per normalized status, for the filter tab badges.
pub fn status_counts(appointments: &[Appointment]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for appointment in appointments {
        *counts.entry(appointment.status.to_string()).or_insert(0) += 1;
    }
    counts
}

/// The session user's appointments. No user, no appointments.
pub async fn load_for_user(
    api: &dyn ConsultApi,
    user_id: Option<&str>,
) -> Result<Vec<Appointment>, ApiClientError> {
    match user_id {
        Some(user_id) => api.appointments_for_user(user_id).await,
        None => Ok(Vec::new()),
    }
}

/// Feedback shown in the detail modal: the appointment's own entries, else the
/// service's. Upstream failures and deleted services show as no feedback.
pub async fn feedback_for_detail(api: &dyn ConsultApi, appointment: &Appointment) -> Vec<Feedback> {
    match api.feedback_for_appointment(&appointment.id).await {
        Ok(entries) if !entries.is_empty() => return entries,
        Ok(_) => {}
        Err(e) => warn!("Feedback lookup for appointment {} failed: {}", appointment.id, e),
    }

    let Some(service_id) = appointment.service_id() else {
        return Vec::new();
    };
    api.feedback_for_service(service_id).await.unwrap_or_else(|e| {
        warn!("Feedback lookup for service {} failed: {}", service_id, e);
        Vec::new()
    })
}

/// Whether the appointment already has feedback recorded under its own id.
pub async fn has_own_feedback(
    api: &dyn ConsultApi,
    appointment: &Appointment,
) -> Result<bool, ApiClientError> {
    if appointment.has_feedback {
        return Ok(true);
    }
    Ok(!api.feedback_for_appointment(&appointment.id).await?.is_empty())
}

pub fn sort_newest_first(appointments: &mut [&Appointment]) {
    appointments.sort_by_key(|a| Reverse(a.date_booking));
}
