//! Authenticated admin API transport.
//!
//! Every call goes through [`AuthenticatedRequester::send`], which attaches the
//! current bearer token and, on a 401, refreshes the session once and retries
//! the request once. Concurrent callers that hit an expired token share a
//! single refresh. The refresh runs as its own task, keyed by the credential
//! generation it started from, so it completes even if the caller that
//! started it goes away; every caller awaits the same outcome.

use crate::credentials::{CredentialSnapshot, SessionCredentials};
use crate::error::{ApiError, ApiResult};
use crate::models::{endpoints, RefreshRequest, RefreshResponse, TokenPair};
use crate::session_fsm::SessionEvent;
use crate::state::SessionStateMachine;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// How a request is authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    /// Attach the bearer token; on 401 refresh once and retry once.
    #[default]
    Refreshing,
    /// Attach the bearer token, never refresh.
    BearerOnly,
    /// No bearer token, never refresh.
    Anonymous,
}

/// An admin API request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    auth: AuthMode,
}

impl ApiRequest {
    /// Request for `path`, relative to the API base URL.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth: AuthMode::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Set an already-built JSON body.
    pub fn json_value(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn auth(mut self, mode: AuthMode) -> Self {
        self.auth = mode;
        self
    }

    pub fn anonymous(self) -> Self {
        self.auth(AuthMode::Anonymous)
    }

    pub fn bearer_only(self) -> Self {
        self.auth(AuthMode::BearerOnly)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Decode the body as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Body as JSON when it parses, as a JSON string otherwise, `null` when empty.
    pub fn json_value(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body).unwrap_or_else(|_| Value::String(self.text()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
enum RefreshOutcome {
    /// Credentials to retry with.
    Refreshed(CredentialSnapshot),
    /// The session is gone; surface the original 401.
    Failed,
    /// The session changed underneath the refresh; its result was discarded.
    Stale,
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Refresh in progress for one credential generation.
struct InFlightRefresh {
    generation: u64,
    outcome: SharedRefresh,
}

/// HTTP client and base URL; cheap to clone into a refresh task.
#[derive(Clone)]
struct Transport {
    client: Client,
    base_url: Url,
}

impl Transport {
    fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// One HTTP round-trip, abandoned if `scope` is cancelled first.
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
        scope: &CancellationToken,
    ) -> ApiResult<ApiResponse> {
        let url = self.endpoint(&request.path)?;

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, path = %request.path, "Sending API request");

        let response = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(ApiError::Cancelled),
            response = builder.send() => response?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(ApiError::Cancelled),
            body = response.bytes() => body?,
        };

        if scope.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        if status.is_success() {
            return Ok(ApiResponse {
                status,
                body: body.to_vec(),
            });
        }

        let error = ApiError::from_response(status, &body);
        debug!(
            method = %request.method,
            path = %request.path,
            status = %status,
            error = %error,
            "API request failed"
        );
        Err(error)
    }
}

/// Outbound admin API client bound to the session.
pub struct AuthenticatedRequester {
    transport: Transport,
    credentials: Arc<SessionCredentials>,
    machine: Arc<SessionStateMachine>,
    in_flight: Mutex<Option<InFlightRefresh>>,
}

impl AuthenticatedRequester {
    /// Create a requester with its own HTTP client using `timeout` per request.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        credentials: Arc<SessionCredentials>,
        machine: Arc<SessionStateMachine>,
    ) -> ApiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, credentials, machine))
    }

    /// Create a requester over an existing HTTP client.
    pub fn with_client(
        client: Client,
        base_url: Url,
        credentials: Arc<SessionCredentials>,
        machine: Arc<SessionStateMachine>,
    ) -> Self {
        Self {
            transport: Transport { client, base_url },
            credentials,
            machine,
            in_flight: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.transport.base_url
    }

    /// Absolute URL for an endpoint path.
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        self.transport.endpoint(path)
    }

    /// Send a request, refreshing the session once on 401 when the request
    /// mode allows it.
    pub async fn send(&self, request: &ApiRequest) -> ApiResult<ApiResponse> {
        let snapshot = self.credentials.snapshot();
        let bearer = match request.auth {
            AuthMode::Anonymous => None,
            AuthMode::Refreshing | AuthMode::BearerOnly => snapshot.access_token(),
        };

        let error = match self.transport.execute(request, bearer, &snapshot.scope).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !error.is_authentication()
            || request.auth != AuthMode::Refreshing
            || snapshot.refresh_token().is_none()
        {
            return Err(error);
        }

        debug!(path = %request.path, "Access token rejected, refreshing");
        match self.coalesced_refresh(&snapshot).await {
            RefreshOutcome::Refreshed(current) => {
                self.transport
                    .execute(request, current.access_token(), &current.scope)
                    .await
            }
            RefreshOutcome::Failed => Err(error),
            RefreshOutcome::Stale => Err(ApiError::Cancelled),
        }
    }

    /// Send a request and decode a JSON response.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        self.send(request).await?.json()
    }

    /// Await the refresh for the credentials a 401 was observed under,
    /// starting it if no caller has yet.
    async fn coalesced_refresh(&self, seen: &CredentialSnapshot) -> RefreshOutcome {
        if seen.scope.is_cancelled() {
            return RefreshOutcome::Failed;
        }

        let outcome = {
            let mut in_flight = self.in_flight.lock();

            let current = self.credentials.snapshot();
            if current.generation != seen.generation {
                debug!("Reusing credentials from a completed refresh");
                return if current.is_live() {
                    RefreshOutcome::Refreshed(current)
                } else {
                    RefreshOutcome::Failed
                };
            }

            match in_flight.as_ref() {
                Some(refresh) if refresh.generation == current.generation => {
                    debug!("Joining refresh in flight");
                    refresh.outcome.clone()
                }
                _ => {
                    let outcome = self.start_refresh(current);
                    *in_flight = Some(InFlightRefresh {
                        generation: seen.generation,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        };

        outcome.await
    }

    /// Spawn the refresh for `basis` so it runs to completion independently
    /// of the callers awaiting it.
    fn start_refresh(&self, basis: CredentialSnapshot) -> SharedRefresh {
        let task = tokio::spawn(run_refresh(
            self.transport.clone(),
            self.credentials.clone(),
            self.machine.clone(),
            basis,
        ));

        async move {
            task.await.unwrap_or_else(|e| {
                warn!(error = %e, "Token refresh task did not complete");
                RefreshOutcome::Failed
            })
        }
        .boxed()
        .shared()
    }
}

async fn run_refresh(
    transport: Transport,
    credentials: Arc<SessionCredentials>,
    machine: Arc<SessionStateMachine>,
    basis: CredentialSnapshot,
) -> RefreshOutcome {
    let Some(refresh_token) = basis.refresh_token() else {
        return RefreshOutcome::Failed;
    };

    match request_refresh(&transport, refresh_token, &basis.scope).await {
        Ok(tokens) => {
            if !credentials.commit_refresh(&basis, tokens.clone()) {
                return RefreshOutcome::Stale;
            }
            info!("Access token refreshed");
            if let Err(e) = machine.dispatch(&SessionEvent::RefreshSucceeded(tokens)) {
                debug!(error = %e, "Refresh not reflected in session state");
            }
            RefreshOutcome::Refreshed(credentials.snapshot())
        }
        Err(ApiError::Cancelled) => RefreshOutcome::Stale,
        Err(e) => {
            warn!(error = %e, "Token refresh failed, ending session");
            if credentials.teardown_if_current(&basis) {
                if let Err(e) = machine.dispatch(&SessionEvent::RefreshFailed) {
                    debug!(error = %e, "Refresh failure not reflected in session state");
                }
            }
            RefreshOutcome::Failed
        }
    }
}

async fn request_refresh(
    transport: &Transport,
    refresh_token: &str,
    scope: &CancellationToken,
) -> ApiResult<TokenPair> {
    let request = ApiRequest::post(endpoints::REFRESH)
        .anonymous()
        .json(&RefreshRequest { refresh_token })?;
    let response: RefreshResponse = transport.execute(&request, None, scope).await?.json()?;
    Ok(response.into())
}
