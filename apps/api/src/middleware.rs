use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Instant;

use axum::RequestExt;
use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::{ConnectInfo, Extension, Query, RawPathParams, Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use ecclesia_application::{AccessDecision, AccessDenial, AuditActor, RequestAuditContext};
use ecclesia_core::UserIdentity;
use ecclesia_domain::{Permission, classify_outcome, is_excluded_path};
use ipnet::IpNet;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ApiResult;
use crate::state::AppState;

/// Largest request or response body the audit stage buffers.
const MAX_AUDITED_BODY_BYTES: u64 = 256 * 1024;

/// Permissions a route group accepts; holding any one of them suffices.
#[derive(Debug, Clone, Copy)]
pub struct RequiredPermissions(pub &'static [Permission]);

/// Attaches the bearer token's identity to the request when it resolves.
///
/// Never rejects: missing, malformed, expired and revoked tokens leave the
/// request anonymous and later stages decide.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match state.auth_service.resolve_bearer(token.as_str()).await {
            Ok(Some(identity)) => {
                request.extensions_mut().insert(identity);
            }
            Ok(None) => debug!("bearer token did not resolve"),
            Err(error) => warn!(error = %error, "failed to resolve bearer token"),
        }
    }

    next.run(request).await
}

/// Records classified requests in the audit trail after the handler ran.
///
/// The write happens on a spawned task so storage latency and failures never
/// reach the client.
pub async fn record_audit(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if is_excluded_path(path.as_str()) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let method = request.method().as_str().to_owned();
    let query_params = Query::<Vec<(String, String)>>::try_from_uri(request.uri())
        .map(|Query(params)| params)
        .unwrap_or_default();
    let path_params = request
        .extract_parts::<RawPathParams>()
        .await
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.ip());
    let ip_address = client_ip(request.headers(), peer, &state.trusted_proxies);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let request_actor = request
        .extensions()
        .get::<UserIdentity>()
        .map(AuditActor::from_identity);

    let (request, request_body) = capture_request_json(request).await;
    let response = next.run(request).await;
    let status_code = response.status().as_u16();
    if classify_outcome(method.as_str(), path.as_str(), status_code).is_none() {
        return response;
    }

    // Login responses carry the identity they just authenticated.
    let actor = request_actor
        .or_else(|| {
            response
                .extensions()
                .get::<UserIdentity>()
                .map(AuditActor::from_identity)
        })
        .unwrap_or_else(AuditActor::anonymous);

    let (response, response_body) = capture_json_body(response).await;
    let context = RequestAuditContext {
        method,
        path,
        query_params,
        path_params,
        status_code,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        ip_address: ip_address.map(|address| address.to_string()),
        user_agent,
        actor,
        request_body,
        response_body,
        error_message: None,
    };

    let recorder = state.audit_recorder.clone();
    tokio::spawn(async move {
        recorder.record(context).await;
    });

    response
}

pub async fn require_auth(request: Request, next: Next) -> ApiResult<Response> {
    if request.extensions().get::<UserIdentity>().is_none() {
        return Err(AccessDenial::AuthenticationRequired.into());
    }

    Ok(next.run(request).await)
}

/// Admits the request when the caller's role grants any of the route's
/// [`RequiredPermissions`] after expansion. The role is re-read on every call.
pub async fn require_permissions(
    State(state): State<AppState>,
    Extension(required): Extension<RequiredPermissions>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let decision = state
        .authorization_service
        .authorize(request.extensions().get::<UserIdentity>(), required.0)
        .await?;

    match decision {
        AccessDecision::Granted(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        AccessDecision::Denied(denial) => Err(denial.into()),
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let decision = state
        .authorization_service
        .authorize_admin(request.extensions().get::<UserIdentity>())
        .await?;

    match decision {
        AccessDecision::Granted(principal) => {
            request.extensions_mut().insert(principal);
            Ok(next.run(request).await)
        }
        AccessDecision::Denied(denial) => Err(denial.into()),
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then(|| token.to_owned())
}

/// Resolves the client address. `X-Forwarded-For` is only honoured when the
/// direct peer is a trusted proxy; its left-most valid entry wins.
pub(crate) fn client_ip(
    headers: &HeaderMap,
    peer: Option<IpAddr>,
    trusted_proxies: &[IpNet],
) -> Option<IpAddr> {
    let peer_is_trusted =
        peer.is_some_and(|peer| trusted_proxies.iter().any(|network| network.contains(&peer)));
    if !peer_is_trusted {
        return peer;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .split(',')
                .map(str::trim)
                .find_map(|candidate| IpAddr::from_str(candidate).ok())
        })
        .or(peer)
}

async fn capture_json_body(response: Response) -> (Response, Option<Value>) {
    let (parts, body) = response.into_parts();
    let (body, value) = buffer_json(&parts.headers, body, "response").await;
    (Response::from_parts(parts, body), value)
}

/// Buffers the JSON payload of updates so the recorder can snapshot it.
async fn capture_request_json(request: Request) -> (Request, Option<Value>) {
    let is_update = matches!(request.method(), &Method::PUT | &Method::PATCH);
    if !is_update {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    let (body, value) = buffer_json(&parts.headers, body, "request").await;
    (Request::from_parts(parts, body), value)
}

async fn buffer_json(headers: &HeaderMap, body: Body, label: &str) -> (Body, Option<Value>) {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"));
    let fits = body
        .size_hint()
        .exact()
        .is_some_and(|length| length <= MAX_AUDITED_BODY_BYTES);
    if !is_json || !fits {
        return (body, None);
    }

    match to_bytes(body, usize::MAX).await {
        Ok(bytes) => {
            let value = serde_json::from_slice::<Value>(&bytes).ok();
            (Body::from(bytes), value)
        }
        Err(error) => {
            warn!(error = %error, body = label, "failed to buffer body for audit");
            (Body::empty(), None)
        }
    }
}
