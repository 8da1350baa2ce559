use chrono::Utc;
use rocket::serde::json::Json;
use rocket::State;
use rocket::form::FromForm;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use std::collections::BTreeMap;
use log::warn;

use crate::config::PortalConfig;
use crate::guards::{AuthGuard, OptionalAuth};
use crate::models::{AppointmentView, FeedbackView, AppointmentStatus};
use crate::services::{appointments, ApiHandle};
use crate::utils::{display_offset, validate_id, ApiError, ApiResponse};

#[derive(FromForm, serde::Deserialize, JsonSchema)]
pub struct AppointmentListQuery {
    /// Normalized status, or `all`.
    pub status: Option<String>,
    /// Matched against consultant and service names.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AppointmentListing {
    pub appointments: Vec<AppointmentView>,
    pub total: usize,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AppointmentDetail {
    pub appointment: AppointmentView,
    pub feedback: Vec<FeedbackView>,
}

/// List the signed-in user's appointments
#[openapi(tag = "Appointments")]
#[get("/appointments?<query..>")]
pub async fn list_appointments(
    api: &State<ApiHandle>,
    config: &State<PortalConfig>,
    session: OptionalAuth,
    query: AppointmentListQuery,
) -> Json<ApiResponse<AppointmentListing>> {
    let loaded = appointments::load_for_user(api.inner().as_ref(), session.user_id()).await;

    let (all, message) = match loaded {
        Ok(all) => (all, None),
        Err(e) => {
            warn!("Appointment list unavailable: {}", e);
            (Vec::new(), Some("Appointments are temporarily unavailable"))
        }
    };

    let status = appointments::status_filter(query.status.as_deref());
    let mut rows = appointments::filter_appointments(&all, status.as_ref(), query.search.as_deref());
    appointments::sort_newest_first(&mut rows);

    let now = Utc::now();
    let views: Vec<AppointmentView> = rows
        .into_iter()
        .map(|a| AppointmentView::build(a, now, config.review_window(), config.reschedule_lead()))
        .collect();

    let listing = AppointmentListing {
        total: views.len(),
        appointments: views,
    };

    Json(match message {
        Some(message) => ApiResponse::success_with_message(message, listing),
        None => ApiResponse::success(listing),
    })
}

/// Appointment counts per status for the filter tabs
#[openapi(tag = "Appointments")]
#[get("/appointments/summary")]
pub async fn appointment_summary(
    api: &State<ApiHandle>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<BTreeMap<String, usize>>>, ApiError> {
    let all = api.appointments_for_user(&auth.user_id).await?;
    Ok(Json(ApiResponse::success(appointments::status_counts(&all))))
}

/// Appointment detail, with feedback once completed
#[openapi(tag = "Appointments")]
#[get("/appointments/<appointment_id>")]
pub async fn get_appointment(
    api: &State<ApiHandle>,
    config: &State<PortalConfig>,
    auth: AuthGuard,
    appointment_id: String,
) -> Result<Json<ApiResponse<AppointmentDetail>>, ApiError> {
    if !validate_id(&appointment_id) {
        return Err(ApiError::bad_request("Invalid appointment ID"));
    }

    let all = api.appointments_for_user(&auth.user_id).await?;
    let appointment = all
        .iter()
        .find(|a| a.id == appointment_id)
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    let feedback = if appointment.status == AppointmentStatus::Completed {
        appointments::feedback_for_detail(api.inner().as_ref(), appointment).await
    } else {
        Vec::new()
    };
    let has_own_feedback = feedback
        .iter()
        .any(|f| f.appointment_id.as_deref() == Some(appointment.id.as_str()));

    let now = Utc::now();
    let mut view = AppointmentView::build(appointment, now, config.review_window(), config.reschedule_lead());
    view.can_review = appointment.can_review(has_own_feedback, now, config.review_window());

    let offset = display_offset(config.display_utc_offset_minutes);
    Ok(Json(ApiResponse::success(AppointmentDetail {
        appointment: view,
        feedback: feedback
            .into_iter()
            .map(|f| FeedbackView::build(f, offset))
            .collect(),
    })))
}
