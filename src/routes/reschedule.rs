use chrono::Utc;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Deserialize;

use crate::config::PortalConfig;
use crate::guards::AuthGuard;
use crate::models::AppointmentView;
use crate::services::{RescheduleError, RescheduleRegistry, RescheduleView};
use crate::utils::{validate_id, ApiError, ApiResponse};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChooseConsultantDto {
    pub consultant_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SelectSlotDto {
    pub slot_id: String,
}

fn require_id(id: &str, what: &str) -> Result<(), ApiError> {
    if validate_id(id) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid {} ID", what)))
    }
}

/// Start rescheduling one of the user's appointments
#[openapi(tag = "Reschedule")]
#[post("/appointments/<appointment_id>/reschedule")]
pub async fn open_reschedule(
    registry: &State<RescheduleRegistry>,
    auth: AuthGuard,
    appointment_id: String,
) -> Result<Json<ApiResponse<RescheduleView>>, ApiError> {
    require_id(&appointment_id, "appointment")?;

    let view = registry.open(&auth.user_id, &appointment_id, Utc::now()).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Current reschedule session, including any expiry notice
#[openapi(tag = "Reschedule")]
#[get("/reschedule")]
pub async fn get_reschedule(
    registry: &State<RescheduleRegistry>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<RescheduleView>>, ApiError> {
    let view = registry
        .status(&auth.user_id)
        .await
        .ok_or(RescheduleError::NoSession)?;
    Ok(Json(ApiResponse::success(view)))
}

#[openapi(tag = "Reschedule")]
#[post("/reschedule/consultant", data = "<dto>")]
pub async fn choose_consultant(
    registry: &State<RescheduleRegistry>,
    auth: AuthGuard,
    dto: Json<ChooseConsultantDto>,
) -> Result<Json<ApiResponse<RescheduleView>>, ApiError> {
    require_id(&dto.consultant_id, "consultant")?;

    let view = registry
        .choose_consultant(&auth.user_id, &dto.consultant_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Hold a slot for the remainder of the session
#[openapi(tag = "Reschedule")]
#[post("/reschedule/slot", data = "<dto>")]
pub async fn select_slot(
    registry: &State<RescheduleRegistry>,
    auth: AuthGuard,
    dto: Json<SelectSlotDto>,
) -> Result<Json<ApiResponse<RescheduleView>>, ApiError> {
    require_id(&dto.slot_id, "slot")?;

    let view = registry
        .select_slot(&auth.user_id, &dto.slot_id, Utc::now())
        .await?;
    Ok(Json(ApiResponse::success(view)))
}

/// Move the appointment to the held slot
#[openapi(tag = "Reschedule")]
#[post("/reschedule/confirm")]
pub async fn confirm_reschedule(
    registry: &State<RescheduleRegistry>,
    config: &State<PortalConfig>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<AppointmentView>>>, ApiError> {
    let appointments = registry.confirm(&auth.user_id).await?;

    let now = Utc::now();
    let views = appointments
        .iter()
        .map(|a| AppointmentView::build(a, now, config.review_window(), config.reschedule_lead()))
        .collect();

    Ok(Json(ApiResponse::success_with_message(
        "Appointment rescheduled successfully",
        views,
    )))
}

/// Close the session and release any held slot
#[openapi(tag = "Reschedule")]
#[delete("/reschedule")]
pub async fn cancel_reschedule(
    registry: &State<RescheduleRegistry>,
    auth: AuthGuard,
) -> Json<ApiResponse<bool>> {
    let closed = registry.cancel(&auth.user_id).await;
    Json(ApiResponse::success(closed))
}
