use actix_web::{
    body::BoxBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::{header::{HeaderName, HeaderValue}, Method},
    web, Error, ResponseError,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::{rc::Rc, task::{Context, Poll}};

use crate::{
    constants::USER_ID_HEADER,
    errors::AppError,
    limiter::rate_limiter::Decision,
    utils::{client_ip::client_ip, valid_uuid::valid_user_id},
    AppState,
};

const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Throttles uploads per caller. Only POSTs count; other methods on the
/// wrapped resource pass straight through.
pub struct UploadRateLimit;

impl<S> Transform<S, ServiceRequest> for UploadRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = UploadRateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(UploadRateLimitService {
            service: Rc::new(service),
        })
    }
}

pub struct UploadRateLimitService<S> {
    service: Rc<S>,
}

/// Forwarded user id when present and well-formed, else the client address.
fn caller_key(req: &ServiceRequest, trust_forwarded_for: bool) -> String {
    let user = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| valid_user_id(value).ok());

    match user {
        Some(user_id) => format!("user:{}", user_id),
        None => format!("ip:{}", client_ip(req.request(), trust_forwarded_for)),
    }
}

impl<S> Service<ServiceRequest> for UploadRateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<BoxBody>, Error = Error> + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if req.method() != Method::POST {
                return service.call(req).await;
            }

            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                tracing::error!("AppState missing in rate limit middleware");
                return service.call(req).await;
            };
            let Some(limiter) = state.upload_limiter.as_ref() else {
                return service.call(req).await;
            };

            let key = caller_key(&req, state.trust_forwarded_for);
            match limiter.check(&key) {
                Decision::Allowed { remaining } => {
                    let mut res = service.call(req).await?;
                    res.headers_mut().insert(
                        HeaderName::from_static(REMAINING_HEADER),
                        HeaderValue::from(remaining),
                    );
                    Ok(res)
                }
                Decision::Limited { retry_after_secs } => {
                    tracing::warn!(caller = %key, retry_after_secs, "upload rate limit exceeded");
                    let response = AppError::RateLimited(retry_after_secs).error_response();
                    Ok(req.into_response(response))
                }
            }
        })
    }
}
