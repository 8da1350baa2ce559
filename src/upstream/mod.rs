use log::{error, info};
use rocket::fairing::AdHoc;
use std::sync::Arc;

use crate::config::PortalConfig;
use crate::services::{ApiHandle, HttpConsultApi, RescheduleRegistry};

/// Builds the booking API client and the reschedule registry on top of it.
/// Ignition fails when the client cannot be constructed.
pub fn init() -> AdHoc {
    AdHoc::try_on_ignite("Booking API", |rocket| async {
        let Some(config) = rocket.state::<PortalConfig>().cloned() else {
            error!("✗ Portal configuration is not managed");
            return Err(rocket);
        };

        match HttpConsultApi::new(&config) {
            Ok(client) => {
                info!("✓ Booking API client ready for {}", config.api_base_url);
                let api: ApiHandle = Arc::new(client);
                let registry = RescheduleRegistry::new(
                    api.clone(),
                    config.slot_hold(),
                    config.reschedule_lead(),
                );
                Ok(rocket.manage(api).manage(registry))
            }
            Err(e) => {
                error!("✗ Failed to build booking API client: {}", e);
                Err(rocket)
            }
        }
    })
}
