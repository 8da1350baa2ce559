//! In-memory booking API used by unit and route tests.

use chrono::{Duration, Utc};
use rocket::http::Header;
use rocket::local::asynchronous::Client;
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::PortalConfig;

use crate::models::{
    Appointment, Consultant, Feedback, NewFeedback, Quiz, QuizResult, QuizResultFilter,
    QuizResultPage, QuizResultStats, RescheduleRequest, SlotStatus, SlotTime,
};
use crate::services::{ApiClientError, ApiHandle, ApiResult, ConsultApi, JwtService, RescheduleRegistry};

pub const USER: &str = "u-1";
pub const SECRET: &str = "test-secret";

pub fn test_config() -> PortalConfig {
    PortalConfig {
        jwt_secret: SECRET.to_string(),
        ..PortalConfig::default()
    }
}

/// Local client over the full route table, backed by `api`.
pub async fn client(api: Arc<FakeApi>) -> Client {
    let config = test_config();
    let handle: ApiHandle = api;
    let registry = RescheduleRegistry::new(handle.clone(), config.slot_hold(), config.reschedule_lead());

    let rocket = crate::build(config).manage(handle).manage(registry);
    Client::tracked(rocket).await.unwrap()
}

pub fn token(user_id: &str, role: Option<&str>) -> Header<'static> {
    Header::new(
        "Authorization",
        format!("Bearer {}", JwtService::issue_token(user_id, role, SECRET)),
    )
}

pub struct FakeApi {
    appointments: Vec<Appointment>,
    consultants: Vec<Consultant>,
    slots: Vec<SlotTime>,
    feedback: Mutex<Vec<Feedback>>,
    quizzes: Vec<Quiz>,
    results: Vec<QuizResult>,
    stats: QuizResultStats,
    slot_updates: Mutex<Vec<(String, SlotStatus)>>,
    reschedules: Mutex<Vec<RescheduleRequest>>,
    created_feedback: Mutex<Vec<NewFeedback>>,
    result_queries: Mutex<Vec<(QuizResultFilter, u32, u32)>>,
    failing_bookings: Mutex<HashSet<String>>,
    fail_reschedule: Mutex<bool>,
    offline: Mutex<bool>,
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}

impl FakeApi {
    pub fn seeded() -> Self {
        let now = Utc::now();

        let appointments = vec![
            decode(json!({
                "_id": "a-1",
                "consultant_id": { "_id": "c-1", "name": "Dr. Mai Tran" },
                "service_id": { "_id": "s-1", "name": "Couples Counselling" },
                "slotTime_id": "slot-orig",
                "dateBooking": now + Duration::days(2),
                "status": "confirmed",
            })),
            decode(json!({
                "_id": "a-completed",
                "consultant_id": { "_id": "c-2", "name": "Dr. Binh Le" },
                "service_id": { "_id": "s-2", "name": "Stress Management" },
                "slotTime_id": "slot-old",
                "dateBooking": now - Duration::days(2),
                "status": "complete",
            })),
            decode(json!({
                "_id": "a-legacy",
                "consultant_id": { "_id": "c-1", "name": "Dr. Mai Tran" },
                "service_id": { "_id": "s-3", "name": "Career Coaching" },
                "slotTime_id": "slot-legacy",
                "dateBooking": now + Duration::hours(5),
                "status": "confirm",
                "isRescheduled": false,
            })),
            decode(json!({
                "_id": "a-old",
                "consultant_id": "c-2",
                "service_id": "s-4",
                "slotTime_id": "slot-older",
                "dateBooking": now - Duration::days(10),
                "status": "completed",
                "hasFeedback": false,
            })),
        ];

        let consultants = vec![
            decode(json!({ "_id": "c-1", "name": "Dr. Mai Tran", "specialty": "Family" })),
            decode(json!({ "_id": "c-2", "name": "Dr. Binh Le" })),
        ];

        let slots = vec![
            decode(json!({
                "_id": "slot-b", "consultant_id": "c-2", "status": "available",
                "start_time": now + Duration::days(2), "end_time": now + Duration::days(2) + Duration::hours(1),
            })),
            decode(json!({
                "_id": "slot-a", "consultant_id": "c-2", "status": "available",
                "start_time": now + Duration::days(1), "end_time": now + Duration::days(1) + Duration::hours(1),
            })),
            decode(json!({
                "_id": "slot-taken", "consultant_id": "c-2", "status": "booked",
                "start_time": now + Duration::days(1), "end_time": now + Duration::days(1) + Duration::hours(1),
            })),
            decode(json!({
                "_id": "slot-past", "consultant_id": "c-2", "status": "available",
                "start_time": now - Duration::hours(1), "end_time": now,
            })),
        ];

        let feedback = vec![decode(json!({
            "_id": "f-1",
            "rating": 5,
            "comment": "Practical advice",
            "createdAt": now - Duration::days(1),
            "account_id": { "_id": "u-7", "name": "Lan" },
            "service_id": "s-2",
        }))];

        let quizzes = vec![
            decode(json!({ "_id": "q-1", "title": "ASSIST" })),
            decode(json!({ "_id": "q-2", "title": "CRAFFT" })),
        ];

        let results = vec![
            decode(json!({
                "_id": "r-1",
                "quiz_id": { "_id": "q-1", "title": "ASSIST" },
                "user_id": { "_id": "u-1", "name": "Khoa" },
                "answers": [
                    { "question_id": { "_id": "qq-1", "content": "Used in the past 3 months?", "options": [
                        { "text": "Never", "score": 0 }, { "text": "Weekly", "score": 4 }
                    ] }, "selectedOptionIndex": 1, "score": 4 },
                    { "question_id": null, "selectedOptionIndex": 0, "score": 2 },
                    { "question_id": { "_id": "qq-2", "content": "Tried to cut down?", "options": [] }, "selectedOptionIndex": 3, "score": 0 }
                ],
                "totalScore": 6,
                "riskLevel": "moderate",
                "suggestedAction": "Brief intervention",
                "createdAt": now - Duration::days(1),
            })),
            decode(json!({
                "_id": "r-2",
                "quiz_id": { "_id": "q-2", "title": "CRAFFT" },
                "user_id": "u-2",
                "answers": [],
                "totalScore": 1,
                "riskLevel": "low",
                "createdAt": now - Duration::days(3),
            })),
            decode(json!({
                "_id": "r-3",
                "quiz_id": { "_id": "q-1", "title": "ASSIST" },
                "user_id": "u-3",
                "answers": [],
                "totalScore": 27,
                "riskLevel": "high",
                "createdAt": now - Duration::days(20),
            })),
            decode(json!({
                "_id": "r-4",
                "quiz_id": "q-9",
                "answers": [],
                "totalScore": 0,
                "riskLevel": "low",
                "createdAt": now - Duration::days(20),
            })),
        ];

        let stats = decode(json!({
            "total": 4,
            "recent": 2,
            "score": { "min": 0.0, "avg": 8.5, "max": 27.0 },
            "riskDistribution": [
                { "risk_level": "low", "count": 2 },
                { "risk_level": "moderate", "count": 1 },
                { "risk_level": "high", "count": 1 }
            ],
            "quizDistribution": [
                { "quiz_id": "q-1", "title": "ASSIST", "count": 2 },
                { "quiz_id": "q-2", "title": "CRAFFT", "count": 1 }
            ]
        }));

        FakeApi {
            appointments,
            consultants,
            slots,
            feedback: Mutex::new(feedback),
            quizzes,
            results,
            stats,
            slot_updates: Mutex::new(Vec::new()),
            reschedules: Mutex::new(Vec::new()),
            created_feedback: Mutex::new(Vec::new()),
            result_queries: Mutex::new(Vec::new()),
            failing_bookings: Mutex::new(HashSet::new()),
            fail_reschedule: Mutex::new(false),
            offline: Mutex::new(false),
        }
    }

    /// Adds an appointment whose consultant, service and slot were deleted
    /// upstream, and a result whose quiz was deleted.
    pub fn with_deleted_references(mut self) -> Self {
        let now = Utc::now();
        self.appointments.push(decode(json!({
            "_id": "a-orphan",
            "consultant_id": null,
            "service_id": null,
            "slotTime_id": null,
            "dateBooking": now + Duration::days(3),
            "status": "confirmed",
        })));
        self.results.push(decode(json!({
            "_id": "r-orphan",
            "quiz_id": null,
            "answers": [],
            "totalScore": 3,
            "riskLevel": "low",
            "createdAt": now - Duration::days(2),
        })));
        self
    }

    pub fn fail_reschedule(&self) {
        *self.fail_reschedule.lock().unwrap() = true;
    }

    pub fn fail_booking(&self, slot_id: &str) {
        self.failing_bookings.lock().unwrap().insert(slot_id.to_string());
    }

    /// Every call fails as if the booking API were unreachable.
    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn slot_updates(&self) -> Vec<(String, SlotStatus)> {
        self.slot_updates.lock().unwrap().clone()
    }

    pub fn releases_of(&self, slot_id: &str) -> usize {
        self.slot_updates()
            .iter()
            .filter(|(id, status)| id == slot_id && *status == SlotStatus::Available)
            .count()
    }

    pub fn reschedules(&self) -> Vec<RescheduleRequest> {
        self.reschedules.lock().unwrap().clone()
    }

    pub fn created_feedback(&self) -> Vec<(String, String, u8, String)> {
        self.created_feedback
            .lock()
            .unwrap()
            .iter()
            .map(|f| {
                (
                    f.account_id.clone(),
                    f.service_id.clone().unwrap_or_default(),
                    f.rating,
                    f.comment.clone(),
                )
            })
            .collect()
    }

    pub fn result_queries(&self) -> Vec<(QuizResultFilter, u32, u32)> {
        self.result_queries.lock().unwrap().clone()
    }

    fn check_online(&self) -> ApiResult<()> {
        if *self.offline.lock().unwrap() {
            return Err(ApiClientError::Upstream {
                status: 503,
                message: "Service Unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl ConsultApi for FakeApi {
    async fn appointments_for_user(&self, user_id: &str) -> ApiResult<Vec<Appointment>> {
        self.check_online()?;
        if user_id == USER {
            Ok(self.appointments.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn feedback_for_appointment(&self, appointment_id: &str) -> ApiResult<Vec<Feedback>> {
        self.check_online()?;
        Ok(self
            .feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.appointment_id.as_deref() == Some(appointment_id))
            .cloned()
            .collect())
    }

    async fn feedback_for_service(&self, service_id: &str) -> ApiResult<Vec<Feedback>> {
        self.check_online()?;
        Ok(self
            .feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.service_id.as_deref() == Some(service_id))
            .cloned()
            .collect())
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> ApiResult<Feedback> {
        self.check_online()?;
        self.created_feedback.lock().unwrap().push(NewFeedback {
            account_id: feedback.account_id.clone(),
            appointment_id: feedback.appointment_id.clone(),
            service_id: feedback.service_id.clone(),
            rating: feedback.rating,
            comment: feedback.comment.clone(),
        });

        let created: Feedback = decode(json!({
            "_id": format!("f-{}", feedback.appointment_id),
            "rating": feedback.rating,
            "comment": feedback.comment,
            "createdAt": Utc::now(),
            "account_id": feedback.account_id,
            "appointment_id": feedback.appointment_id,
            "service_id": feedback.service_id,
        }));
        self.feedback.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn slots_for_consultant(&self, consultant_id: &str) -> ApiResult<Vec<SlotTime>> {
        self.check_online()?;
        Ok(self
            .slots
            .iter()
            .filter(|s| s.consultant_id == consultant_id)
            .cloned()
            .collect())
    }

    async fn update_slot_status(
        &self,
        slot_id: &str,
        status: SlotStatus,
        _holder: Option<&str>,
    ) -> ApiResult<SlotTime> {
        self.check_online()?;
        if status == SlotStatus::Booked && self.failing_bookings.lock().unwrap().contains(slot_id) {
            return Err(ApiClientError::Upstream {
                status: 409,
                message: "Slot already booked".to_string(),
            });
        }

        self.slot_updates
            .lock()
            .unwrap()
            .push((slot_id.to_string(), status));

        let mut slot = self
            .slots
            .iter()
            .find(|s| s.id == slot_id)
            .cloned()
            .unwrap_or_else(|| decode(json!({
                "_id": slot_id, "status": "available",
                "start_time": Utc::now(), "end_time": Utc::now(),
            })));
        slot.status = status;
        Ok(slot)
    }

    async fn reschedule(&self, request: &RescheduleRequest) -> ApiResult<Vec<Appointment>> {
        self.check_online()?;
        if *self.fail_reschedule.lock().unwrap() {
            return Err(ApiClientError::Upstream {
                status: 400,
                message: "Reschedule rejected".to_string(),
            });
        }
        self.reschedules.lock().unwrap().push(request.clone());
        Ok(self
            .appointments
            .iter()
            .filter(|a| a.id == request.appointment_id)
            .cloned()
            .collect())
    }

    async fn consultants(&self) -> ApiResult<Vec<Consultant>> {
        self.check_online()?;
        Ok(self.consultants.clone())
    }

    async fn quizzes(&self) -> ApiResult<Vec<Quiz>> {
        self.check_online()?;
        Ok(self.quizzes.clone())
    }

    async fn quiz_results(
        &self,
        filter: &QuizResultFilter,
        page: u32,
        limit: u32,
    ) -> ApiResult<QuizResultPage> {
        self.check_online()?;
        self.result_queries
            .lock()
            .unwrap()
            .push((filter.clone(), page, limit));

        let matching: Vec<QuizResult> = self
            .results
            .iter()
            .filter(|r| filter.quiz_id.as_deref().is_none_or(|q| r.quiz_id() == Some(q)))
            .filter(|r| filter.risk_level.is_none_or(|risk| r.risk_level == risk))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let results = matching
            .into_iter()
            .skip(((page - 1) * limit) as usize)
            .take(limit as usize)
            .collect();

        Ok(QuizResultPage {
            results,
            pagination: crate::models::Pagination {
                page,
                limit,
                total,
                pages: total.div_ceil(u64::from(limit)) as u32,
            },
        })
    }

    async fn quiz_result_stats(&self, _filter: &QuizResultFilter) -> ApiResult<QuizResultStats> {
        self.check_online()?;
        Ok(self.stats.clone())
    }

    async fn quiz_result(&self, id: &str) -> ApiResult<QuizResult> {
        self.check_online()?;
        self.results
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(ApiClientError::Upstream {
                status: 404,
                message: "Quiz result not found".to_string(),
            })
    }
}
