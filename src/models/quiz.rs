use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;
use std::str::FromStr;

use super::{Account, Identified, Ref};

pub const QUESTION_UNAVAILABLE: &str = "Question unavailable";
pub const OPTION_UNAVAILABLE: &str = "Option unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "moderate" => Ok(RiskLevel::Moderate),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(format!("Unknown risk level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Quiz {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(alias = "name", default)]
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,
}

impl Identified for Quiz {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(alias = "label", alias = "content", default)]
    pub text: String,

    #[serde(default)]
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(alias = "content", alias = "question", default)]
    pub text: String,

    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

impl Identified for Question {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAnswer {
    /// Null once the question has been deleted upstream.
    #[serde(rename = "question_id", alias = "questionId", default)]
    pub question: Option<Ref<Question>>,

    #[serde(alias = "selectedOptionIndex", alias = "selected_option", alias = "selectedOption", default)]
    pub selected_option_index: Option<usize>,

    #[serde(default)]
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    /// `None` when the quiz was deleted after the result was taken.
    #[serde(rename = "quiz_id", alias = "quizId", default)]
    pub quiz: Option<Ref<Quiz>>,

    #[serde(rename = "user_id", alias = "userId", default)]
    pub user: Option<Ref<Account>>,

    #[serde(default)]
    pub answers: Vec<QuizAnswer>,

    #[serde(alias = "totalScore", default)]
    pub total_score: i32,

    #[serde(alias = "riskLevel")]
    pub risk_level: RiskLevel,

    #[serde(alias = "suggestedAction", default)]
    pub suggested_action: Option<String>,

    #[serde(rename = "taken_at", alias = "takenAt", alias = "createdAt", alias = "created_at")]
    pub taken_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn quiz_id(&self) -> Option<&str> {
        self.quiz.as_ref().map(Ref::id)
    }

    pub fn quiz_title(&self) -> Option<&str> {
        self.quiz
            .as_ref()
            .and_then(Ref::populated)
            .map(|quiz| quiz.title.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Pagination {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total: u64,
    #[serde(alias = "totalPages", default)]
    pub pages: u32,
}

/// One page of results as returned upstream. The list may sit beside the
/// pagination under `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizResultPage {
    #[serde(alias = "data", alias = "items", alias = "quizResults")]
    pub results: Vec<QuizResult>,

    #[serde(default)]
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ScoreSummary {
    #[serde(default)]
    pub min: f64,
    #[serde(alias = "average", default)]
    pub avg: f64,
    #[serde(default)]
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RiskCount {
    #[serde(alias = "riskLevel", alias = "_id")]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QuizCount {
    #[serde(alias = "quizId", alias = "_id")]
    pub quiz_id: String,
    #[serde(alias = "quizTitle", default)]
    pub title: Option<String>,
    #[serde(default)]
    pub count: u64,
}

/// Aggregate statistics over the filtered result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QuizResultStats {
    #[serde(alias = "totalCount", alias = "total_count", default)]
    pub total: u64,

    #[serde(alias = "recentCount", alias = "recent_count", default)]
    pub recent: u64,

    #[serde(alias = "scoreStats", alias = "score_stats", default)]
    pub score: ScoreSummary,

    #[serde(alias = "riskDistribution", default)]
    pub risk_distribution: Vec<RiskCount>,

    #[serde(alias = "quizDistribution", default)]
    pub quiz_distribution: Vec<QuizCount>,
}

/// Filters accepted by the results and stats endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizResultFilter {
    pub quiz_id: Option<String>,
    pub user_id: Option<String>,
    pub risk_level: Option<RiskLevel>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl QuizResultFilter {
    /// Upstream query parameters, camel-cased as the booking API expects.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(quiz_id) = &self.quiz_id {
            pairs.push(("quizId", quiz_id.clone()));
        }
        if let Some(user_id) = &self.user_id {
            pairs.push(("userId", user_id.clone()));
        }
        if let Some(risk) = self.risk_level {
            pairs.push(("riskLevel", risk.to_string()));
        }
        if let Some(from) = self.from {
            pairs.push(("from", from.to_rfc3339()));
        }
        if let Some(to) = self.to {
            pairs.push(("to", to.to_rfc3339()));
        }
        pairs
    }

    /// Stats ignore the per-user and risk filters.
    pub fn stats_scope(&self) -> QuizResultFilter {
        QuizResultFilter {
            quiz_id: self.quiz_id.clone(),
            from: self.from,
            to: self.to,
            ..Default::default()
        }
    }
}
