use actix_web::{
    dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpMessage, HttpRequest,
};
use std::future::{ready, Ready};

use crate::config::AuthConfig;
use crate::domain::Caller;
use crate::error::AppError;
use crate::utils::jwt::{bearer_token, validate_token};

/// Caller identity taken from a bearer JWT.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Caller);

impl AuthenticatedUser {
    pub fn caller(&self) -> Caller {
        self.0
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, AppError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or(AppError::Unauthorized)?;
    let config = auth_config(req)?;

    let caller = validate_token(token, config)?.caller();
    req.extensions_mut().insert(caller);
    Ok(AuthenticatedUser(caller))
}

pub fn auth_config(req: &HttpRequest) -> Result<&AuthConfig, AppError> {
    req.app_data::<web::Data<AuthConfig>>()
        .map(|data| data.get_ref())
        .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("missing AuthConfig app data")))
}
