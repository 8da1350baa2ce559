use chrono::Utc;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;
use log::{info, warn};

use crate::config::PortalConfig;
use crate::guards::AuthGuard;
use crate::models::{CreateFeedbackDto, FeedbackView, NewFeedback};
use crate::services::{appointments, ApiHandle};
use crate::utils::{display_offset, validate_id, ApiError, ApiResponse};

/// Leave feedback for a completed appointment
#[openapi(tag = "Feedback")]
#[post("/feedback", data = "<dto>")]
pub async fn create_feedback(
    api: &State<ApiHandle>,
    config: &State<PortalConfig>,
    auth: AuthGuard,
    dto: Json<CreateFeedbackDto>,
) -> Result<Json<ApiResponse<FeedbackView>>, ApiError> {
    dto.validate()?;

    if !validate_id(&dto.appointment_id) {
        return Err(ApiError::bad_request("Invalid appointment ID"));
    }

    let all = api.appointments_for_user(&auth.user_id).await?;
    let appointment = all
        .iter()
        .find(|a| a.id == dto.appointment_id)
        .ok_or_else(|| ApiError::not_found("Appointment not found"))?;

    let has_feedback = appointments::has_own_feedback(api.inner().as_ref(), appointment).await?;
    if !appointment.can_review(has_feedback, Utc::now(), config.review_window()) {
        return Err(ApiError::bad_request("This appointment can no longer be reviewed"));
    }

    let feedback = NewFeedback {
        account_id: auth.user_id.clone(),
        appointment_id: appointment.id.clone(),
        service_id: appointment.service_id().map(str::to_string),
        rating: dto.rating,
        comment: dto.comment.trim().to_string(),
    };

    let created = api.create_feedback(&feedback).await?;
    info!(
        "Feedback {} submitted by {} for appointment {}",
        created.id, auth.user_id, appointment.id
    );

    Ok(Json(ApiResponse::success_with_message(
        "Feedback submitted successfully",
        FeedbackView::build(created, display_offset(config.display_utc_offset_minutes)),
    )))
}

/// Feedback recorded for one appointment
#[openapi(tag = "Feedback")]
#[get("/feedback/appointment/<appointment_id>")]
pub async fn get_appointment_feedback(
    api: &State<ApiHandle>,
    config: &State<PortalConfig>,
    _auth: AuthGuard,
    appointment_id: String,
) -> Result<Json<ApiResponse<Vec<FeedbackView>>>, ApiError> {
    if !validate_id(&appointment_id) {
        return Err(ApiError::bad_request("Invalid appointment ID"));
    }

    let entries = api
        .feedback_for_appointment(&appointment_id)
        .await
        .unwrap_or_else(|e| {
            warn!("Feedback lookup for appointment {} failed: {}", appointment_id, e);
            Vec::new()
        });

    let offset = display_offset(config.display_utc_offset_minutes);
    Ok(Json(ApiResponse::success(
        entries
            .into_iter()
            .map(|f| FeedbackView::build(f, offset))
            .collect(),
    )))
}
