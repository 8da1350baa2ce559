use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::PortalConfig;
use crate::models::{
    Appointment, Consultant, Feedback, NewFeedback, Quiz, QuizResult, QuizResultFilter,
    QuizResultPage, QuizResultStats, RescheduleRequest, SlotStatus, SlotStatusUpdate, SlotTime,
};

#[derive(Debug, Error)]
pub enum ApiClientError {
    #[error("Booking API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Booking API returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Unexpected booking API response: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiClientError>;

/// Every call the portal makes against the booking API.
#[rocket::async_trait]
pub trait ConsultApi: Send + Sync {
    async fn appointments_for_user(&self, user_id: &str) -> ApiResult<Vec<Appointment>>;

    async fn feedback_for_appointment(&self, appointment_id: &str) -> ApiResult<Vec<Feedback>>;

    async fn feedback_for_service(&self, service_id: &str) -> ApiResult<Vec<Feedback>>;

    async fn create_feedback(&self, feedback: &NewFeedback) -> ApiResult<Feedback>;

    async fn slots_for_consultant(&self, consultant_id: &str) -> ApiResult<Vec<SlotTime>>;

    async fn update_slot_status(
        &self,
        slot_id: &str,
        status: SlotStatus,
        holder: Option<&str>,
    ) -> ApiResult<SlotTime>;

    async fn reschedule(&self, request: &RescheduleRequest) -> ApiResult<Vec<Appointment>>;

    async fn consultants(&self) -> ApiResult<Vec<Consultant>>;

    async fn quizzes(&self) -> ApiResult<Vec<Quiz>>;

    async fn quiz_results(
        &self,
        filter: &QuizResultFilter,
        page: u32,
        limit: u32,
    ) -> ApiResult<QuizResultPage>;

    async fn quiz_result_stats(&self, filter: &QuizResultFilter) -> ApiResult<QuizResultStats>;

    async fn quiz_result(&self, id: &str) -> ApiResult<QuizResult>;
}

/// Upstream bodies come either bare or wrapped in `{ "data": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    fn into_inner(self) -> T {
        match self {
            Envelope::Wrapped { data } => data,
            Envelope::Bare(inner) => inner,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Deserialize)]
struct UpstreamMessage {
    message: String,
}

pub(crate) fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    serde_json::from_str::<Envelope<T>>(body)
        .map(Envelope::into_inner)
        .map_err(|e| ApiClientError::Decode(e.to_string()))
}

/// reqwest-backed client for the booking API.
pub struct HttpConsultApi {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpConsultApi {
    pub fn new(config: &PortalConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(HttpConsultApi {
            client,
            base_url: config.api_base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let res = self.authorize(request).send().await?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<UpstreamMessage>(&body)
                .map(|m| m.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("Upstream error")
                        .to_string()
                });
            return Err(ApiClientError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        decode(&body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        debug!("GET {}", path);
        self.send(self.client.get(self.url(path))).await
    }
}

#[rocket::async_trait]
impl ConsultApi for HttpConsultApi {
    async fn appointments_for_user(&self, user_id: &str) -> ApiResult<Vec<Appointment>> {
        self.get(&format!("/appointments/user/{}", user_id)).await
    }

    async fn feedback_for_appointment(&self, appointment_id: &str) -> ApiResult<Vec<Feedback>> {
        self.get(&format!("/feedback/appointment/{}", appointment_id))
            .await
    }

    async fn feedback_for_service(&self, service_id: &str) -> ApiResult<Vec<Feedback>> {
        self.get(&format!("/feedback/service/{}", service_id)).await
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> ApiResult<Feedback> {
        debug!("POST /feedback for appointment {}", feedback.appointment_id);
        self.send(self.client.post(self.url("/feedback")).json(feedback))
            .await
    }

    async fn slots_for_consultant(&self, consultant_id: &str) -> ApiResult<Vec<SlotTime>> {
        self.get(&format!("/slot-times/consultant/{}", consultant_id))
            .await
    }

    async fn update_slot_status(
        &self,
        slot_id: &str,
        status: SlotStatus,
        holder: Option<&str>,
    ) -> ApiResult<SlotTime> {
        debug!("PATCH /slot-times/{}/status -> {:?}", slot_id, status);
        let body = SlotStatusUpdate {
            status,
            user_id: holder,
        };
        self.send(
            self.client
                .patch(self.url(&format!("/slot-times/{}/status", slot_id)))
                .json(&body),
        )
        .await
    }

    async fn reschedule(&self, request: &RescheduleRequest) -> ApiResult<Vec<Appointment>> {
        debug!("POST /appointments/reschedule for {}", request.appointment_id);
        let updated: OneOrMany<Appointment> = self
            .send(
                self.client
                    .post(self.url("/appointments/reschedule"))
                    .json(request),
            )
            .await?;
        Ok(updated.into())
    }

    async fn consultants(&self) -> ApiResult<Vec<Consultant>> {
        self.get("/consultants").await
    }

    async fn quizzes(&self) -> ApiResult<Vec<Quiz>> {
        self.get("/quizzes").await
    }

    async fn quiz_results(
        &self,
        filter: &QuizResultFilter,
        page: u32,
        limit: u32,
    ) -> ApiResult<QuizResultPage> {
        let mut query = filter.query_pairs();
        query.push(("page", page.to_string()));
        query.push(("limit", limit.to_string()));

        self.send(self.client.get(self.url("/quiz-results")).query(&query))
            .await
    }

    async fn quiz_result_stats(&self, filter: &QuizResultFilter) -> ApiResult<QuizResultStats> {
        self.send(
            self.client
                .get(self.url("/quiz-results/stats"))
                .query(&filter.stats_scope().query_pairs()),
        )
        .await
    }

    async fn quiz_result(&self, id: &str) -> ApiResult<QuizResult> {
        self.get(&format!("/quiz-results/{}", id)).await
    }
}
