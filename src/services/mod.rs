pub mod api;
pub mod appointments;
pub mod jwt;
pub mod quiz_results;
pub mod reschedule;

pub use api::{ApiClientError, ApiResult, ConsultApi, HttpConsultApi};
pub use jwt::JwtService;
pub use reschedule::{RescheduleError, RescheduleRegistry, RescheduleView};

use std::sync::Arc;

/// Shared booking API handle kept in Rocket state.
pub type ApiHandle = Arc<dyn ConsultApi>;
