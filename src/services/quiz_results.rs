use chrono::{DateTime, Utc};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::models::{
    Pagination, QuizAnswer, QuizResult, RiskLevel, OPTION_UNAVAILABLE,
    QUESTION_UNAVAILABLE,
};

const UNTITLED_QUIZ: &str = "Untitled quiz";

#[derive(Debug, Serialize, JsonSchema)]
pub struct QuizResultRow {
    pub id: String,
    pub quiz_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub total_score: i32,
    pub risk_level: RiskLevel,
    pub suggested_action: Option<String>,
    pub taken_at: DateTime<Utc>,
}

impl From<&QuizResult> for QuizResultRow {
    fn from(result: &QuizResult) -> Self {
        QuizResultRow {
            id: result.id.clone(),
            quiz_id: result.quiz_id().map(str::to_string),
            user_id: result.user.as_ref().map(|u| u.id().to_string()),
            user_name: result
                .user
                .as_ref()
                .and_then(|u| u.populated())
                .and_then(|account| account.name.clone()),
            total_score: result.total_score,
            risk_level: result.risk_level,
            suggested_action: result.suggested_action.clone(),
            taken_at: result.taken_at,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct QuizResultGroup {
    pub quiz_title: String,
    pub results: Vec<QuizResultRow>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct QuizResultListing {
    pub groups: Vec<QuizResultGroup>,
    pub pagination: Pagination,
}

/// Groups a page of results by quiz title, keeping the order in which titles
/// first appear. Results whose quiz was not populated fall back to the quiz
/// catalog, then to a placeholder. So do results whose quiz was deleted.
pub fn group_by_quiz_title(
    results: &[QuizResult],
    catalog_title: impl Fn(&str) -> Option<String>,
) -> Vec<QuizResultGroup> {
    let mut groups: Vec<QuizResultGroup> = Vec::new();

    for result in results {
        let title = result
            .quiz_title()
            .map(str::to_string)
            .or_else(|| result.quiz_id().and_then(&catalog_title))
            .unwrap_or_else(|| UNTITLED_QUIZ.to_string());

        match groups.iter_mut().find(|g| g.quiz_title == title) {
            Some(group) => group.results.push(result.into()),
            None => groups.push(QuizResultGroup {
                quiz_title: title,
                results: vec![result.into()],
            }),
        }
    }

    groups
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct AnswerView {
    pub question_id: Option<String>,
    pub question: String,
    pub selected_option: String,
    pub score: i32,
}

impl From<&QuizAnswer> for AnswerView {
    fn from(answer: &QuizAnswer) -> Self {
        let question = answer.question.as_ref().and_then(|q| q.populated());

        let selected_option = question
            .zip(answer.selected_option_index)
            .and_then(|(q, index)| q.options.get(index))
            .map(|option| option.text.clone())
            .unwrap_or_else(|| OPTION_UNAVAILABLE.to_string());

        AnswerView {
            question_id: answer.question.as_ref().map(|q| q.id().to_string()),
            question: question
                .map(|q| q.text.clone())
                .unwrap_or_else(|| QUESTION_UNAVAILABLE.to_string()),
            selected_option,
            score: answer.score,
        }
    }
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct QuizResultDetail {
    #[serde(flatten)]
    pub summary: QuizResultRow,
    pub quiz_title: String,
    pub answers: Vec<AnswerView>,
}

impl From<&QuizResult> for QuizResultDetail {
    fn from(result: &QuizResult) -> Self {
        QuizResultDetail {
            summary: result.into(),
            quiz_title: result.quiz_title().unwrap_or(UNTITLED_QUIZ).to_string(),
            answers: result.answers.iter().map(AnswerView::from).collect(),
        }
    }
}
