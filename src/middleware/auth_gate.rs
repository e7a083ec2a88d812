/// Auth Gate Middleware
///
/// Classifies every request against the route catalogue. Public routes pass through
/// untouched; everything else must carry a valid access token as
/// `Authorization: Bearer <token>`. The verified `Identity` is inserted into request
/// extensions for handlers to read.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::TokenAuthority;
use crate::error::{AppError, AuthError};
use crate::route_table::{Access, RouteTable};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from the Authorization header, if any.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub struct AuthGate {
    authority: TokenAuthority,
}

impl AuthGate {
    pub fn new(authority: TokenAuthority) -> Self {
        Self { authority }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGateService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGateService {
            service: Rc::new(service),
            authority: self.authority.clone(),
            routes: Rc::new(RouteTable::new()),
        }))
    }
}

pub struct AuthGateService<S> {
    service: Rc<S>,
    authority: TokenAuthority,
    routes: Rc<RouteTable>,
}

impl<S> AuthGateService<S> {
    fn authenticate(&self, req: &ServiceRequest) -> Result<(), AppError> {
        let token = bearer_token(req.request()).ok_or_else(|| {
            tracing::info!(path = %req.path(), "Protected route requested without a token");
            AuthError::NoToken
        })?;

        let identity = self.authority.verify_access(&token).map_err(|kind| {
            tracing::info!(path = %req.path(), reason = kind.detail(), "Access token rejected");
            AuthError::InvalidAccessToken(kind)
        })?;

        tracing::debug!(user_id = %identity.id, path = %req.path(), "Access token verified");
        req.extensions_mut().insert(identity);
        Ok(())
    }
}

impl<S, B> Service<ServiceRequest> for AuthGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if self.routes.access_for(req.method(), req.path()) == Access::Protected {
            if let Err(err) = self.authenticate(&req) {
                let response = req
                    .into_response(ResponseError::error_response(&err))
                    .map_into_right_body();
                return Box::pin(async move { Ok(response) });
            }
        }

        let service = self.service.clone();
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
