use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use validator::{Validate, ValidationError};

use super::{Account, Ref};
use crate::utils::{format_display_date, star_glyphs};

pub const MAX_COMMENT_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    pub rating: u8,

    #[serde(default)]
    pub comment: String,

    #[serde(rename = "createdAt", alias = "created_at", alias = "submitted_at")]
    pub submitted_at: DateTime<Utc>,

    #[serde(rename = "account_id", alias = "accountId", default)]
    pub author: Option<Ref<Account>>,

    #[serde(alias = "appointmentId", default)]
    pub appointment_id: Option<String>,

    #[serde(alias = "serviceId", default)]
    pub service_id: Option<String>,
}

/// Feedback submission from the review form.
#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct CreateFeedbackDto {
    pub appointment_id: String,

    #[serde(default)]
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: u8,

    #[serde(default)]
    #[validate(custom = "validate_comment")]
    pub comment: String,
}

fn validate_comment(comment: &str) -> Result<(), ValidationError> {
    let trimmed = comment.trim();

    if trimmed.is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Comment is required".into());
        return Err(err);
    }

    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        let mut err = ValidationError::new("too_long");
        err.message = Some(format!("Comment must be at most {} characters", MAX_COMMENT_CHARS).into());
        return Err(err);
    }

    Ok(())
}

/// Body sent upstream when creating feedback.
#[derive(Debug, Serialize)]
pub struct NewFeedback {
    pub account_id: String,
    pub appointment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub rating: u8,
    pub comment: String,
}

/// Read-only feedback row for display.
#[derive(Debug, Serialize, JsonSchema)]
pub struct FeedbackView {
    pub id: String,
    pub rating: u8,
    pub stars: String,
    pub comment: String,
    pub submitted_at: DateTime<Utc>,
    pub submitted_on: String,
    pub author_name: Option<String>,
}

impl FeedbackView {
    pub fn build(feedback: Feedback, offset: FixedOffset) -> Self {
        let author_name = feedback
            .author
            .as_ref()
            .and_then(|author| author.populated())
            .and_then(|account| account.name.clone());

        FeedbackView {
            stars: star_glyphs(feedback.rating),
            submitted_on: format_display_date(feedback.submitted_at, offset),
            id: feedback.id,
            rating: feedback.rating,
            comment: feedback.comment,
            submitted_at: feedback.submitted_at,
            author_name,
        }
    }
}
