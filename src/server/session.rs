use super::error::ServiceError;
use super::state::ServerState;
use crate::streaming::{is_valid_id, Listener};

use axum::{
    extract::FromRequestParts,
    http::{header::HeaderMap, request::Parts},
};
use tracing::debug;

pub const HEADER_LISTENER_ID: &str = "X-Listener-Id";
pub const HEADER_SUBSCRIPTION_TIER: &str = "X-Subscription-Tier";
pub const HEADER_SUBSCRIPTION_STATUS: &str = "X-Subscription-Status";

const FREE_TIER: &str = "free";
const ACTIVE_STATUS: &str = "active";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub listener_id: String,
    pub premium: bool,
}

impl Session {
    pub fn listener(&self) -> Listener {
        Listener {
            id: self.listener_id.clone(),
            premium: self.premium,
        }
    }
}

/// Turns request headers into a caller identity. Authentication itself
/// happens upstream.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> Option<Session>;
}

/// Trusts the identity headers injected by the auth gateway. A subscription
/// tier only counts while its status is `active`; anything other than the
/// free tier is premium.
pub struct GatewayHeaderResolver;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl SessionResolver for GatewayHeaderResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<Session> {
        let listener_id = header(headers, HEADER_LISTENER_ID)?;
        if !is_valid_id(listener_id) {
            debug!("Ignoring malformed listener id header");
            return None;
        }

        let active = header(headers, HEADER_SUBSCRIPTION_STATUS)
            .map(|s| s.eq_ignore_ascii_case(ACTIVE_STATUS))
            .unwrap_or(false);
        let premium = active
            && header(headers, HEADER_SUBSCRIPTION_TIER)
                .map(|tier| !tier.eq_ignore_ascii_case(FREE_TIER))
                .unwrap_or(false);

        Some(Session {
            listener_id: listener_id.to_string(),
            premium,
        })
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        ctx.session_resolver
            .resolve(&parts.headers)
            .ok_or(ServiceError::Forbidden)
    }
}

impl FromRequestParts<ServerState> for Option<Session> {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(ctx.session_resolver.resolve(&parts.headers))
    }
}
