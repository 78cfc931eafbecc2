//! Bearer token middleware.
//!
//! Reads the `Authorization: Bearer <token>` header, if there is one, and verifies it with the server's
//! [`TokenIssuer`]. Verified claims are stored in the request extensions, where the [`JwtClaims`] extractor and the
//! ACL middleware find them.
//!
//! A request without the header passes through untouched, since public routes accept anonymous callers. A header that
//! is present but does not verify is rejected with 401 straight away.

use std::{
    future::{ready, Ready},
    rc::Rc,
};

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace};

use crate::{
    auth::{JwtClaims, TokenIssuer},
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    issuer: TokenIssuer,
}

impl JwtMiddlewareFactory {
    pub fn new(issuer: TokenIssuer) -> Self {
        JwtMiddlewareFactory { issuer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareService { issuer: self.issuer.clone(), service: Rc::new(service) }))
    }
}

pub struct JwtMiddlewareService<S> {
    issuer: TokenIssuer,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let claims = match req.headers().get(AUTHORIZATION) {
            None => {
                trace!("🔐️ No bearer token on {}", req.path());
                None
            },
            Some(value) => Some(bearer_claims(&self.issuer, value.to_str().ok())),
        };
        Box::pin(async move {
            match claims {
                None => {},
                Some(Ok(claims)) => {
                    trace!("🔐️ Bearer token verified for coordinator {}", claims.sub);
                    req.extensions_mut().insert(claims);
                },
                Some(Err(e)) => {
                    debug!("🔐️ Rejecting request to {}. {e}", req.path());
                    return Err(ServerError::AuthenticationError(e).into());
                },
            }
            service.call(req).await
        })
    }
}

fn bearer_claims(issuer: &TokenIssuer, header: Option<&str>) -> Result<JwtClaims, AuthError> {
    let token = header
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected 'Bearer <token>'".to_string()))?;
    issuer.verify(token)
}
