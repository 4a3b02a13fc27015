//! Bluesky XRPC client.

use std::fmt;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::types::{AuthorFeedResponse, CreateSessionRequest, SessionResponse, XrpcError};
use crate::error::SourceError;
use crate::post::Post;
use crate::source::PostSource;

/// Default PDS / entryway.
pub const DEFAULT_SERVICE: &str = "https://bsky.social";

/// Bluesky client authenticated with an app password.
pub struct BlueskyClient {
    service: String,
    identifier: String,
    password: String,
    client: reqwest::Client,
    session: RwLock<Option<SessionResponse>>,
}

impl BlueskyClient {
    /// Create a client for `identifier` (handle or email) and an app password.
    #[must_use]
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            identifier: identifier.into(),
            password: password.into(),
            client: reqwest::Client::new(),
            session: RwLock::new(None),
        }
    }

    /// Override the service URL.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{method}", self.service)
    }

    /// Current access token, logging in first if there is no session.
    async fn access_token(&self) -> Result<String, SourceError> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.access_jwt.clone());
        }
        self.authenticate().await?;
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_jwt.clone())
            .ok_or_else(|| SourceError::Auth("no session after login".to_string()))
    }

    /// One `getAuthorFeed` request with the given token.
    async fn get_author_feed(
        &self,
        token: &str,
        actor: &str,
        limit: u32,
    ) -> Result<AuthorFeedResponse, SourceError> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(self.xrpc_url("app.bsky.feed.getAuthorFeed"))
            .bearer_auth(token)
            .query(&[("actor", actor), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json::<AuthorFeedResponse>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

impl fmt::Debug for BlueskyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyClient")
            .field("service", &self.service)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PostSource for BlueskyClient {
    async fn authenticate(&self) -> Result<(), SourceError> {
        if self.identifier.is_empty() || self.password.is_empty() {
            return Err(SourceError::Auth("identifier and app password are required".to_string()));
        }

        let response = self
            .client
            .post(self.xrpc_url("com.atproto.server.createSession"))
            .json(&CreateSessionRequest {
                identifier: &self.identifier,
                password: &self.password,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: XrpcError = response.json().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "{status}: {} {}",
                body.error, body.message
            )));
        }

        let session: SessionResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        info!(handle = %session.handle, did = %session.did, "Authenticated with Bluesky");
        *self.session.write().await = Some(session);
        Ok(())
    }

    async fn fetch_recent_posts(&self, actor: &str, limit: u32) -> Result<Vec<Post>, SourceError> {
        let token = self.access_token().await?;

        let feed = match self.get_author_feed(&token, actor, limit).await {
            Err(e) if is_expired_session(&e) => {
                warn!(error = %e, "Bluesky session expired, logging in again");
                *self.session.write().await = None;
                let token = self.access_token().await?;
                self.get_author_feed(&token, actor, limit).await?
            }
            other => other?,
        };

        let posts: Vec<Post> = feed.feed.into_iter().map(|item| item.into_post()).collect();
        debug!(actor, count = posts.len(), "Fetched author feed");
        Ok(posts)
    }
}

/// Build an API error from a non-success response.
async fn api_error(response: reqwest::Response) -> SourceError {
    let status = response.status();
    let body: XrpcError = response.json().await.unwrap_or_default();
    SourceError::Api {
        status: status.as_u16(),
        error: body.error,
        message: body.message,
    }
}

/// Whether `err` means the access token must be replaced.
fn is_expired_session(err: &SourceError) -> bool {
    match err {
        SourceError::Api { status, error, .. } => {
            *status == StatusCode::UNAUTHORIZED.as_u16()
                || error == "ExpiredToken"
                || error == "InvalidToken"
        }
        _ => false,
    }
}
