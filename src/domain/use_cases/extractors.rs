use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};

use crate::{constants::USER_ID_HEADER, errors::AppError, utils::valid_uuid::valid_user_id};

/// Caller identity forwarded by the upstream authentication layer.
/// Returns 400 when the header is missing or not a path-safe token.
/// Usage: Add `user: UserId` as a parameter to your handler function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for UserId {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let header = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        match valid_user_id(header) {
            Ok(user_id) => ready(Ok(UserId(user_id))),
            Err(e) => ready(Err(e.into())),
        }
    }
}
