#[macro_use]
extern crate rocket;

mod config;
mod guards;
mod models;
mod routes;
mod services;
mod upstream;
mod utils;

#[cfg(test)]
mod testing;

use config::PortalConfig;
use dotenvy::dotenv;
use log::{info, warn};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PATCH, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

#[catch(401)]
fn unauthorized() -> Value {
    json!({
        "success": false,
        "message": "Please sign in to continue"
    })
}

#[catch(403)]
fn forbidden() -> Value {
    json!({
        "success": false,
        "message": "You do not have access to this resource"
    })
}

#[catch(404)]
fn not_found() -> Value {
    json!({
        "success": false,
        "message": "Resource not found (check /api/v1 prefix)"
    })
}

#[catch(422)]
fn unprocessable() -> Value {
    json!({
        "success": false,
        "message": "Malformed request body"
    })
}

#[catch(500)]
fn internal_error() -> Value {
    json!({
        "success": false,
        "message": "Something went wrong. Please reload the page and try again."
    })
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- BUILD ----------------------------- */

/// Route table, catchers and configuration. The booking API handle and the
/// reschedule registry are managed separately so tests can supply their own.
pub fn build(config: PortalConfig) -> Rocket<Build> {
    rocket::build()
        .manage(config)
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Appointments
                routes::appointment::list_appointments,
                routes::appointment::appointment_summary,
                routes::appointment::get_appointment,
                // Feedback
                routes::feedback::create_feedback,
                routes::feedback::get_appointment_feedback,
                // Reschedule
                routes::reschedule::open_reschedule,
                routes::reschedule::get_reschedule,
                routes::reschedule::choose_consultant,
                routes::reschedule::select_slot,
                routes::reschedule::confirm_reschedule,
                routes::reschedule::cancel_reschedule,
                // Admin - quiz results
                routes::admin::get_quizzes,
                routes::admin::get_quiz_results,
                routes::admin::get_quiz_result_stats,
                routes::admin::get_quiz_result,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, unprocessable, internal_error],
        )
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    let config = PortalConfig::load();
    if !PortalConfig::is_development() && config.jwt_secret == PortalConfig::default().jwt_secret {
        warn!("JWT secret is still the built-in default outside development");
    }
    info!("🚀 Consult portal running against {}", config.api_base_url);
    info!("📚 Swagger UI → http://localhost:8000/api/docs");

    build(config).attach(upstream::init())
}
