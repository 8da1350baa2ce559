use rocket::request::{self, FromRequest, Request, Outcome};
use rocket::http::Status;
use log::debug;

use crate::config::PortalConfig;
use crate::services::JwtService;
use crate::services::jwt::Claims;

// === OpenAPI (compatible with rocket_okapi 0.8.0 / 0.8.1) ===
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use rocket_okapi::r#gen::OpenApiGenerator;

/// JWT-based authentication guard
pub struct AuthGuard {
    pub user_id: String,
    pub is_admin: bool,
}

impl From<Claims> for AuthGuard {
    fn from(claims: Claims) -> Self {
        AuthGuard {
            is_admin: claims.is_admin(),
            user_id: claims.sub,
        }
    }
}

fn bearer_claims(req: &Request<'_>) -> Option<Result<Claims, ()>> {
    let token = req.headers().get_one("Authorization")?;
    let token = token.trim_start_matches("Bearer ").trim();

    let Some(config) = req.rocket().state::<PortalConfig>() else {
        return Some(Err(()));
    };

    Some(JwtService::verify_token(token, &config.jwt_secret).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
    }))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthGuard {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match bearer_claims(req) {
            Some(Ok(claims)) => Outcome::Success(claims.into()),
            _ => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Session context that may be absent. A missing header yields `None`;
/// a present but invalid token is still rejected.
pub struct OptionalAuth(pub Option<AuthGuard>);

impl OptionalAuth {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|auth| auth.user_id.as_str())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match bearer_claims(req) {
            None => Outcome::Success(OptionalAuth(None)),
            Some(Ok(claims)) => Outcome::Success(OptionalAuth(Some(claims.into()))),
            Some(Err(())) => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// === OpenAPI Integration (Fallback for older versions) ===
/// Keeps OpenAPI generation working even without new traits.
impl<'a> OpenApiFromRequest<'a> for AuthGuard {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        // The guard doesn't contribute any special header/parameter for docs
        Ok(RequestHeaderInput::None)
    }
}

impl<'a> OpenApiFromRequest<'a> for OptionalAuth {
    fn from_request_input(
        _gen: &mut OpenApiGenerator,
        _name: String,
        _required: bool,
    ) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(RequestHeaderInput::None)
    }
}
