use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rocket::form::FromForm;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use rocket_okapi::okapi::schemars::JsonSchema;
use log::{info, warn};

use crate::guards::AdminGuard;
use crate::models::{Quiz, QuizResultFilter, QuizResultStats, RiskLevel};
use crate::services::quiz_results::{group_by_quiz_title, QuizResultDetail, QuizResultListing};
use crate::services::ApiHandle;
use crate::utils::{validate_id, ApiError, ApiResponse};

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(FromForm, serde::Deserialize, JsonSchema)]
pub struct QuizResultsQuery {
    pub quiz_id: Option<String>,
    pub user_id: Option<String>,
    pub risk_level: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub from: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`; a bare date includes the whole day.
    pub to: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(FromForm, serde::Deserialize, JsonSchema)]
pub struct QuizStatsQuery {
    pub quiz_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

fn parse_date_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::bad_request(format!("Invalid date: {}", raw)))?;
    let bound = if end_of_day {
        date.and_hms_milli_opt(23, 59, 59, 999)
    } else {
        date.and_hms_opt(0, 0, 0)
    };

    bound
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid date: {}", raw)))
}

fn optional_id(raw: Option<&str>, what: &str) -> Result<Option<String>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(id) if validate_id(id) => Ok(Some(id.to_string())),
        Some(_) => Err(ApiError::bad_request(format!("Invalid {} ID", what))),
    }
}

fn build_filter(
    quiz_id: Option<&str>,
    user_id: Option<&str>,
    risk_level: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<QuizResultFilter, ApiError> {
    let risk_level = risk_level
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "all")
        .map(|s| s.parse::<RiskLevel>().map_err(|e| ApiError::bad_request(e)))
        .transpose()?;

    let from = from.map(|raw| parse_date_bound(raw, false)).transpose()?;
    let to = to.map(|raw| parse_date_bound(raw, true)).transpose()?;
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ApiError::bad_request("'from' must not be after 'to'"));
        }
    }

    Ok(QuizResultFilter {
        quiz_id: optional_id(quiz_id, "quiz")?,
        user_id: optional_id(user_id, "user")?,
        risk_level,
        from,
        to,
    })
}

/// Quiz catalog for the filter dropdown
#[openapi(tag = "Admin")]
#[get("/admin/quizzes")]
pub async fn get_quizzes(
    api: &State<ApiHandle>,
    _admin: AdminGuard,
) -> Json<ApiResponse<Vec<Quiz>>> {
    match api.quizzes().await {
        Ok(quizzes) => Json(ApiResponse::success(quizzes)),
        Err(e) => {
            warn!("Quiz catalog unavailable: {}", e);
            Json(ApiResponse::success_with_message(
                "Quiz list is temporarily unavailable",
                Vec::new(),
            ))
        }
    }
}

/// Paginated quiz results grouped by quiz title
#[openapi(tag = "Admin")]
#[get("/admin/quiz-results?<query..>")]
pub async fn get_quiz_results(
    api: &State<ApiHandle>,
    admin: AdminGuard,
    query: QuizResultsQuery,
) -> Result<Json<ApiResponse<QuizResultListing>>, ApiError> {
    let filter = build_filter(
        query.quiz_id.as_deref(),
        query.user_id.as_deref(),
        query.risk_level.as_deref(),
        query.from.as_deref(),
        query.to.as_deref(),
    )?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

    let result_page = api.quiz_results(&filter, page, limit).await?;
    info!(
        "Admin {} listed quiz results page {} ({} of {})",
        admin.auth.user_id,
        page,
        result_page.results.len(),
        result_page.pagination.total
    );

    // Only reach for the catalog when some quiz reference came back bare.
    let catalog = if result_page.results.iter().any(|r| r.quiz_title().is_none()) {
        api.quizzes().await.unwrap_or_else(|e| {
            warn!("Quiz catalog unavailable for title fallback: {}", e);
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let groups = group_by_quiz_title(&result_page.results, |quiz_id| {
        catalog
            .iter()
            .find(|q| q.id == quiz_id)
            .map(|q| q.title.clone())
    });

    Ok(Json(ApiResponse::success(QuizResultListing {
        groups,
        pagination: result_page.pagination,
    })))
}

/// Aggregate statistics for the dashboard cards
#[openapi(tag = "Admin")]
#[get("/admin/quiz-results/stats?<query..>")]
pub async fn get_quiz_result_stats(
    api: &State<ApiHandle>,
    _admin: AdminGuard,
    query: QuizStatsQuery,
) -> Result<Json<ApiResponse<QuizResultStats>>, ApiError> {
    let filter = build_filter(
        query.quiz_id.as_deref(),
        None,
        None,
        query.from.as_deref(),
        query.to.as_deref(),
    )?;

    let stats = api.quiz_result_stats(&filter.stats_scope()).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// One quiz result with its answers
#[openapi(tag = "Admin")]
#[get("/admin/quiz-results/<result_id>")]
pub async fn get_quiz_result(
    api: &State<ApiHandle>,
    _admin: AdminGuard,
    result_id: String,
) -> Result<Json<ApiResponse<QuizResultDetail>>, ApiError> {
    if !validate_id(&result_id) {
        return Err(ApiError::bad_request("Invalid result ID"));
    }

    let result = api.quiz_result(&result_id).await?;
    let mut detail = QuizResultDetail::from(&result);

    if result.quiz_title().is_none() {
        if let Ok(catalog) = api.quizzes().await {
            let quiz_id = detail.summary.quiz_id.as_deref();
            if let Some(quiz) = catalog.iter().find(|q| quiz_id == Some(q.id.as_str())) {
                detail.quiz_title = quiz.title.clone();
            }
        }
    }

    Ok(Json(ApiResponse::success(detail)))
}
