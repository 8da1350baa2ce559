//! Reschedule sessions and slot holds.
//!
//! A user picks a consultant, then a slot. Picking a slot marks it `booked`
//! upstream and starts a hold that expires after `slot_hold_secs`. Every way
//! out of a held state gives a slot back exactly once:
//!
//! * confirm succeeds: the appointment's *original* slot is released, the held
//!   slot is now the appointment's;
//! * confirm fails, the session is cancelled, the hold expires, another slot or
//!   consultant is picked: the *held* slot is released.
//!
//! `SlotHold` is move-only and every exit consumes it, so a hold cannot be
//! released twice or silently forgotten in a branch.

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;
use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::{Appointment, Consultant, Identified, RescheduleRequest, SlotStatus, SlotTime};
use crate::services::{ApiClientError, ConsultApi};

#[derive(Debug, Error)]
pub enum RescheduleError {
    #[error("No reschedule in progress")]
    NoSession,

    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("This appointment can no longer be rescheduled")]
    NotEligible,

    #[error("Unknown consultant")]
    UnknownConsultant,

    #[error("Choose a consultant first")]
    NoConsultant,

    #[error("This slot is no longer available")]
    SlotUnavailable,

    #[error("No slot is being held")]
    NoHold,

    #[error(transparent)]
    Api(#[from] ApiClientError),
}

/// A slot marked `booked` on behalf of a user, pending confirmation.
pub struct SlotHold {
    slot: SlotTime,
    generation: u64,
    deadline: Instant,
    expiry: JoinHandle<()>,
}

impl SlotHold {
    pub fn slot(&self) -> &SlotTime {
        &self.slot
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Gives the slot back and stops the expiry timer.
    async fn release(self, api: &dyn ConsultApi) {
        self.expiry.abort();
        self.free(api).await;
    }

    /// Gives the slot back without touching the timer; used by the timer itself.
    async fn free(self, api: &dyn ConsultApi) {
        match api
            .update_slot_status(&self.slot.id, SlotStatus::Available, None)
            .await
        {
            Ok(_) => info!("Released held slot {}", self.slot.id),
            Err(e) => error!("Failed to release held slot {}: {}", self.slot.id, e),
        }
    }

    /// The slot now belongs to the appointment; nothing to give back.
    fn consume(self) -> SlotTime {
        self.expiry.abort();
        self.slot
    }
}

pub enum Stage {
    ChoosingConsultant,
    ChoosingSlot {
        consultant_id: String,
        slots: Vec<SlotTime>,
    },
    SlotHeld {
        consultant_id: String,
        slots: Vec<SlotTime>,
        hold: SlotHold,
    },
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Stage::ChoosingConsultant => "choosing_consultant",
            Stage::ChoosingSlot { .. } => "choosing_slot",
            Stage::SlotHeld { .. } => "slot_held",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    HoldExpired,
}

impl Notice {
    fn message(&self) -> &'static str {
        match self {
            Notice::HoldExpired => "Your slot reservation expired. Please choose a slot again.",
        }
    }
}

pub struct RescheduleSession {
    id: Uuid,
    appointment: Appointment,
    consultants: Vec<Consultant>,
    stage: Stage,
    notice: Option<Notice>,
}

impl RescheduleSession {
    fn view(&self) -> RescheduleView {
        let (selected_consultant_id, slots, held) = match &self.stage {
            Stage::ChoosingConsultant => (None, Vec::new(), None),
            Stage::ChoosingSlot {
                consultant_id,
                slots,
            } => (Some(consultant_id.clone()), slots.clone(), None),
            Stage::SlotHeld {
                consultant_id,
                slots,
                hold,
            } => (Some(consultant_id.clone()), slots.clone(), Some(hold)),
        };

        RescheduleView {
            session_id: self.id.to_string(),
            appointment_id: self.appointment.id.clone(),
            stage: self.stage.name().to_string(),
            consultants: self.consultants.clone(),
            selected_consultant_id,
            slots,
            held_slot: held.map(|hold| hold.slot().clone()),
            remaining_seconds: held.map(|hold| hold.remaining().as_secs_f64().ceil() as u64),
            notice: self.notice,
            notice_message: self.notice.map(|n| n.message().to_string()),
        }
    }
}

/// What the reschedule modal renders.
#[derive(Debug, Serialize, JsonSchema)]
pub struct RescheduleView {
    pub session_id: String,
    pub appointment_id: String,
    pub stage: String,
    pub consultants: Vec<Consultant>,
    pub selected_consultant_id: Option<String>,
    pub slots: Vec<SlotTime>,
    pub held_slot: Option<SlotTime>,
    /// Display hint only; expiry is enforced here, not by the client.
    pub remaining_seconds: Option<u64>,
    pub notice: Option<Notice>,
    pub notice_message: Option<String>,
}

type SessionSlot = Arc<AsyncMutex<Option<RescheduleSession>>>;

struct Inner {
    api: Arc<dyn ConsultApi>,
    sessions: Mutex<HashMap<String, SessionSlot>>,
    hold_duration: Duration,
    reschedule_lead: chrono::Duration,
    generation: AtomicU64,
}

/// Per-user reschedule sessions. Actions of one user run one at a time.
#[derive(Clone)]
pub struct RescheduleRegistry {
    inner: Arc<Inner>,
}

impl RescheduleRegistry {
    pub fn new(
        api: Arc<dyn ConsultApi>,
        hold_duration: Duration,
        reschedule_lead: chrono::Duration,
    ) -> Self {
        RescheduleRegistry {
            inner: Arc::new(Inner {
                api,
                sessions: Mutex::new(HashMap::new()),
                hold_duration,
                reschedule_lead,
                generation: AtomicU64::new(0),
            }),
        }
    }

    fn api(&self) -> &dyn ConsultApi {
        self.inner.api.as_ref()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionSlot>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn session_slot(&self, user_id: &str) -> SessionSlot {
        self.sessions()
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn existing_slot(&self, user_id: &str) -> Option<SessionSlot> {
        self.sessions().get(user_id).cloned()
    }

    /// Drops the user's entry once no session lives in it and no other
    /// caller holds or waits on it. Clones are only taken under the map lock,
    /// so a count of two (map and `slot`) means nobody else can reach it.
    fn prune(&self, user_id: &str, slot: SessionSlot) {
        let mut sessions = self.sessions();
        let is_entry = sessions
            .get(user_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &slot));
        let is_empty = slot.try_lock().is_ok_and(|guard| guard.is_none());

        if is_entry && is_empty && Arc::strong_count(&slot) == 2 {
            sessions.remove(user_id);
        }
    }

    /// Starts a hold on `slot` and arms its expiry timer.
    fn arm(&self, user_id: &str, slot: SlotTime) -> SlotHold {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let deadline = Instant::now() + self.inner.hold_duration;

        let registry = self.clone();
        let user_id = user_id.to_string();
        let expiry = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            registry.expire(&user_id, generation).await;
        });

        SlotHold {
            slot,
            generation,
            deadline,
            expiry,
        }
    }

    async fn expire(&self, user_id: &str, generation: u64) {
        let Some(slot) = self.existing_slot(user_id) else {
            return;
        };
        let mut guard = slot.lock().await;

        let Some(session) = guard.as_mut() else {
            return;
        };

        let is_current = matches!(
            &session.stage,
            Stage::SlotHeld { hold, .. } if hold.generation == generation
        );
        if !is_current {
            return;
        }

        if let Stage::SlotHeld { hold, .. } = mem::replace(&mut session.stage, Stage::ChoosingConsultant) {
            warn!(
                "Slot hold {} for user {} expired without confirmation",
                hold.slot.id, user_id
            );
            session.notice = Some(Notice::HoldExpired);
            hold.free(self.api()).await;
        }
    }

    /// Opens a session for one of the user's appointments. Any session the
    /// user already had is cancelled first.
    pub async fn open(
        &self,
        user_id: &str,
        appointment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RescheduleView, RescheduleError> {
        let slot = self.session_slot(user_id);
        let opened = {
            let mut guard = slot.lock().await;
            self.open_session(&mut guard, user_id, appointment_id, now).await
        };
        self.prune(user_id, slot);
        opened
    }

    async fn open_session(
        &self,
        current: &mut Option<RescheduleSession>,
        user_id: &str,
        appointment_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RescheduleView, RescheduleError> {
        if let Some(previous) = current.take() {
            info!("Replacing reschedule session {} for user {}", previous.id, user_id);
            self.close(previous).await;
        }

        let appointment = self
            .api()
            .appointments_for_user(user_id)
            .await?
            .into_iter()
            .find(|a| a.id == appointment_id)
            .ok_or(RescheduleError::AppointmentNotFound)?;

        if !appointment.can_reschedule(now, self.inner.reschedule_lead) {
            return Err(RescheduleError::NotEligible);
        }

        let consultants = self.api().consultants().await?;

        let session = RescheduleSession {
            id: Uuid::new_v4(),
            appointment,
            consultants,
            stage: Stage::ChoosingConsultant,
            notice: None,
        };
        info!("Reschedule session {} opened for user {}", session.id, user_id);

        let view = session.view();
        *current = Some(session);
        Ok(view)
    }

    /// Selects a consultant and lists their bookable slots. A slot held for a
    /// previous selection is released.
    pub async fn choose_consultant(
        &self,
        user_id: &str,
        consultant_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RescheduleView, RescheduleError> {
        let slot = self.existing_slot(user_id).ok_or(RescheduleError::NoSession)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or(RescheduleError::NoSession)?;
        session.notice = None;

        if !session.consultants.iter().any(|c| c.id() == consultant_id) {
            return Err(RescheduleError::UnknownConsultant);
        }

        if let Stage::SlotHeld { hold, .. } = mem::replace(&mut session.stage, Stage::ChoosingConsultant) {
            hold.release(self.api()).await;
        }

        let mut slots: Vec<SlotTime> = self
            .api()
            .slots_for_consultant(consultant_id)
            .await?
            .into_iter()
            .filter(|s| s.is_bookable(now))
            .collect();
        slots.sort_by_key(|s| s.start_time);

        session.stage = Stage::ChoosingSlot {
            consultant_id: consultant_id.to_string(),
            slots,
        };
        Ok(session.view())
    }

    /// Holds `slot_id`. A different slot already held is released before the
    /// new one is booked; selecting the held slot again changes nothing.
    pub async fn select_slot(
        &self,
        user_id: &str,
        slot_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RescheduleView, RescheduleError> {
        let slot = self.existing_slot(user_id).ok_or(RescheduleError::NoSession)?;
        let mut guard = slot.lock().await;
        let session = guard.as_mut().ok_or(RescheduleError::NoSession)?;
        session.notice = None;

        let chosen = match &session.stage {
            Stage::ChoosingConsultant => return Err(RescheduleError::NoConsultant),
            Stage::SlotHeld { hold, .. } if hold.slot.id == slot_id => return Ok(session.view()),
            Stage::ChoosingSlot { slots, .. } | Stage::SlotHeld { slots, .. } => slots
                .iter()
                .find(|s| s.id == slot_id && s.is_bookable(now))
                .cloned()
                .ok_or(RescheduleError::SlotUnavailable)?,
        };

        let (consultant_id, slots, previous) =
            match mem::replace(&mut session.stage, Stage::ChoosingConsultant) {
                Stage::ChoosingSlot {
                    consultant_id,
                    slots,
                } => (consultant_id, slots, None),
                Stage::SlotHeld {
                    consultant_id,
                    slots,
                    hold,
                } => (consultant_id, slots, Some(hold)),
                Stage::ChoosingConsultant => return Err(RescheduleError::NoConsultant),
            };

        if let Some(previous) = previous {
            info!("Swapping held slot {} for {}", previous.slot.id, slot_id);
            previous.release(self.api()).await;
        }

        match self
            .api()
            .update_slot_status(slot_id, SlotStatus::Booked, Some(user_id))
            .await
        {
            Ok(_) => {
                let hold = self.arm(user_id, chosen);
                info!("Holding slot {} for user {}", slot_id, user_id);
                session.stage = Stage::SlotHeld {
                    consultant_id,
                    slots,
                    hold,
                };
                Ok(session.view())
            }
            Err(e) => {
                warn!("Could not hold slot {}: {}", slot_id, e);
                session.stage = Stage::ChoosingSlot {
                    consultant_id,
                    slots,
                };
                Err(e.into())
            }
        }
    }

    /// Sends the reschedule request for the held slot and ends the session.
    /// Returns the user's refreshed appointment list.
    pub async fn confirm(&self, user_id: &str) -> Result<Vec<Appointment>, RescheduleError> {
        let slot = self.existing_slot(user_id).ok_or(RescheduleError::NoSession)?;
        let confirmed = {
            let mut guard = slot.lock().await;
            self.confirm_session(&mut guard, user_id).await
        };
        self.prune(user_id, slot);
        confirmed
    }

    async fn confirm_session(
        &self,
        current: &mut Option<RescheduleSession>,
        user_id: &str,
    ) -> Result<Vec<Appointment>, RescheduleError> {
        let session = current.take().ok_or(RescheduleError::NoSession)?;

        let (consultant_id, hold) = match session.stage {
            Stage::SlotHeld {
                consultant_id,
                hold,
                ..
            } => (consultant_id, hold),
            stage => {
                *current = Some(RescheduleSession {
                    stage,
                    notice: None,
                    ..session
                });
                return Err(RescheduleError::NoHold);
            }
        };

        let original = session.appointment;
        let request = RescheduleRequest {
            appointment_id: original.id.clone(),
            new_slot_id: hold.slot.id.clone(),
            new_consultant_id: (original.consultant_id() != Some(consultant_id.as_str()))
                .then_some(consultant_id),
        };

        match self.api().reschedule(&request).await {
            Ok(updated) => {
                let taken = hold.consume();
                info!(
                    "Appointment {} moved to slot {} for user {}",
                    original.id, taken.id, user_id
                );

                match original.slot_id() {
                    Some(original_slot) => {
                        if let Err(e) = self
                            .api()
                            .update_slot_status(original_slot, SlotStatus::Available, None)
                            .await
                        {
                            error!("Failed to release original slot {}: {}", original_slot, e);
                        }
                    }
                    None => warn!("Appointment {} had no slot to release", original.id),
                }

                match self.api().appointments_for_user(user_id).await {
                    Ok(appointments) => Ok(appointments),
                    Err(e) => {
                        warn!("Appointment refresh failed after reschedule: {}", e);
                        Ok(updated)
                    }
                }
            }
            Err(e) => {
                error!("Reschedule of appointment {} failed: {}", original.id, e);
                hold.release(self.api()).await;
                Err(e.into())
            }
        }
    }

    /// Ends the session, releasing any held slot. Returns whether a session
    /// existed.
    pub async fn cancel(&self, user_id: &str) -> bool {
        let Some(slot) = self.existing_slot(user_id) else {
            return false;
        };
        let previous = slot.lock().await.take();

        let closed = match previous {
            Some(session) => {
                info!("Reschedule session {} cancelled by user {}", session.id, user_id);
                self.close(session).await;
                true
            }
            None => false,
        };
        self.prune(user_id, slot);
        closed
    }

    pub async fn status(&self, user_id: &str) -> Option<RescheduleView> {
        let slot = self.existing_slot(user_id)?;
        let guard = slot.lock().await;
        guard.as_ref().map(RescheduleSession::view)
    }

    async fn close(&self, session: RescheduleSession) {
        if let Stage::SlotHeld { hold, .. } = session.stage {
            hold.release(self.api()).await;
        }
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.sessions().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeApi;
    use chrono::Duration as ChronoDuration;

    const USER: &str = "u-1";
    const HOLD: Duration = Duration::from_secs(120);

    fn registry(api: Arc<FakeApi>) -> RescheduleRegistry {
        RescheduleRegistry::new(api, HOLD, ChronoDuration::hours(3))
    }

    async fn at_slot_choice(api: &Arc<FakeApi>, reg: &RescheduleRegistry) {
        reg.open(USER, "a-1", Utc::now()).await.unwrap();
        let view = reg.choose_consultant(USER, "c-2", Utc::now()).await.unwrap();
        assert_eq!(view.stage, "choosing_slot");
        assert!(api.slot_updates().is_empty());
    }

    #[tokio::test]
    async fn open_rejects_ineligible_appointment() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());

        let err = reg.open(USER, "a-completed", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RescheduleError::NotEligible));

        let err = reg.open(USER, "missing", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RescheduleError::AppointmentNotFound));
        assert!(reg.status(USER).await.is_none());
    }

    #[tokio::test]
    async fn consultant_slots_are_filtered_to_future_available() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        reg.open(USER, "a-1", Utc::now()).await.unwrap();

        let view = reg.choose_consultant(USER, "c-2", Utc::now()).await.unwrap();
        let ids: Vec<&str> = view.slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["slot-a", "slot-b"]);

        let err = reg.choose_consultant(USER, "c-404", Utc::now()).await.unwrap_err();
        assert!(matches!(err, RescheduleError::UnknownConsultant));
    }

    #[tokio::test]
    async fn swapping_slots_releases_before_booking() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        let view = reg.select_slot(USER, "slot-b", Utc::now()).await.unwrap();

        assert_eq!(view.held_slot.map(|s| s.id), Some("slot-b".to_string()));
        assert_eq!(
            api.slot_updates(),
            vec![
                ("slot-a".to_string(), SlotStatus::Booked),
                ("slot-a".to_string(), SlotStatus::Available),
                ("slot-b".to_string(), SlotStatus::Booked),
            ]
        );
    }

    #[tokio::test]
    async fn reselecting_held_slot_is_a_no_op() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        assert_eq!(api.slot_updates().len(), 1);
    }

    #[tokio::test]
    async fn confirm_success_releases_original_slot_only() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();

        let refreshed = reg.confirm(USER).await.unwrap();
        assert!(!refreshed.is_empty());

        assert_eq!(
            api.slot_updates(),
            vec![
                ("slot-a".to_string(), SlotStatus::Booked),
                ("slot-orig".to_string(), SlotStatus::Available),
            ]
        );
        let sent = api.reschedules();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].new_slot_id, "slot-a");
        assert_eq!(sent[0].new_consultant_id.as_deref(), Some("c-2"));
        assert!(reg.status(USER).await.is_none());
    }

    #[tokio::test]
    async fn confirm_failure_releases_held_slot() {
        let api = Arc::new(FakeApi::seeded());
        api.fail_reschedule();
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-b", Utc::now()).await.unwrap();

        assert!(reg.confirm(USER).await.is_err());
        assert_eq!(
            api.slot_updates(),
            vec![
                ("slot-b".to_string(), SlotStatus::Booked),
                ("slot-b".to_string(), SlotStatus::Available),
            ]
        );
        assert!(reg.status(USER).await.is_none());
    }

    #[tokio::test]
    async fn confirm_without_hold_keeps_session() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        let err = reg.confirm(USER).await.unwrap_err();
        assert!(matches!(err, RescheduleError::NoHold));
        assert_eq!(reg.status(USER).await.map(|v| v.stage), Some("choosing_slot".to_string()));
    }

    #[tokio::test]
    async fn cancel_releases_held_slot_once() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();

        assert!(reg.cancel(USER).await);
        assert!(!reg.cancel(USER).await);
        assert_eq!(api.releases_of("slot-a"), 1);
    }

    #[tokio::test]
    async fn choosing_consultant_again_releases_held_slot() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();

        let view = reg.choose_consultant(USER, "c-2", Utc::now()).await.unwrap();
        assert_eq!(view.stage, "choosing_slot");
        assert!(view.held_slot.is_none());
        assert_eq!(api.releases_of("slot-a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hold_dropped_by_consultant_change_never_expires() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        reg.choose_consultant(USER, "c-2", Utc::now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(200)).await;

        let view = reg.status(USER).await.unwrap();
        assert_eq!(view.stage, "choosing_slot");
        assert!(view.notice.is_none());
        assert_eq!(api.releases_of("slot-a"), 1);
    }

    #[tokio::test]
    async fn ended_sessions_leave_no_entry_behind() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());

        at_slot_choice(&api, &reg).await;
        assert_eq!(reg.tracked_users(), 1);
        reg.cancel(USER).await;
        assert_eq!(reg.tracked_users(), 0);

        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        reg.confirm(USER).await.unwrap();
        assert_eq!(reg.tracked_users(), 0);

        assert!(reg.open(USER, "missing", Utc::now()).await.is_err());
        assert!(reg.status("u-nobody").await.is_none());
        assert!(!reg.cancel("u-nobody").await);
        assert_eq!(reg.tracked_users(), 0);
    }

    #[tokio::test]
    async fn session_kept_while_waiting_at_slot_choice() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        assert!(reg.confirm(USER).await.is_err());
        assert_eq!(reg.tracked_users(), 1);
    }

    #[tokio::test]
    async fn appointment_without_slot_or_consultant_can_still_move() {
        let api = Arc::new(FakeApi::seeded().with_deleted_references());
        let reg = registry(api.clone());

        reg.open(USER, "a-orphan", Utc::now()).await.unwrap();
        reg.choose_consultant(USER, "c-2", Utc::now()).await.unwrap();
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        reg.confirm(USER).await.unwrap();

        let sent = api.reschedules();
        assert_eq!(sent[0].appointment_id, "a-orphan");
        assert_eq!(sent[0].new_consultant_id.as_deref(), Some("c-2"));
        assert_eq!(api.slot_updates(), vec![("slot-a".to_string(), SlotStatus::Booked)]);
    }

    #[tokio::test]
    async fn reopening_cancels_previous_hold() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;
        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();

        let view = reg.open(USER, "a-1", Utc::now()).await.unwrap();
        assert_eq!(view.stage, "choosing_consultant");
        assert_eq!(api.releases_of("slot-a"), 1);
    }

    #[tokio::test]
    async fn failed_booking_leaves_slot_choice_open() {
        let api = Arc::new(FakeApi::seeded());
        api.fail_booking("slot-b");
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        assert!(reg.select_slot(USER, "slot-b", Utc::now()).await.is_err());
        let view = reg.status(USER).await.unwrap();
        assert_eq!(view.stage, "choosing_slot");
        assert!(view.held_slot.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_hold_is_released_and_selection_cleared() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        let view = reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        assert_eq!(view.remaining_seconds, Some(120));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(reg.status(USER).await.and_then(|v| v.remaining_seconds), Some(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        let view = reg.status(USER).await.unwrap();
        assert_eq!(view.stage, "choosing_consultant");
        assert!(view.held_slot.is_none());
        assert!(view.selected_consultant_id.is_none());
        assert_eq!(view.notice, Some(Notice::HoldExpired));
        assert_eq!(api.releases_of("slot-a"), 1);

        // nothing left to release on the way out
        reg.cancel(USER).await;
        assert_eq!(api.releases_of("slot-a"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn swapped_out_hold_does_not_expire_later() {
        let api = Arc::new(FakeApi::seeded());
        let reg = registry(api.clone());
        at_slot_choice(&api, &reg).await;

        reg.select_slot(USER, "slot-a", Utc::now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(100)).await;
        reg.select_slot(USER, "slot-b", Utc::now()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;

        let view = reg.status(USER).await.unwrap();
        assert_eq!(view.stage, "slot_held");
        assert_eq!(api.releases_of("slot-a"), 1);
        assert_eq!(api.releases_of("slot-b"), 0);
    }
}
