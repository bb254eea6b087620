//! reqwest implementation of [`EntryGateway`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::payload::{parse_entry, parse_entry_page};
use super::{ApiError, ApiResult, EntryGateway, EntryPage, EntryUpdate};
use crate::auth::{Authenticator, OAuthClient, TokenManager};
use crate::config::ValidatedConfig;
use crate::models::{EntryId, RemoteEntry, RetrieveMode};
use crate::util::compact_text;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Wallabag API client owning its configuration and token cache.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    per_page: u32,
    client: Client,
    tokens: Arc<TokenManager>,
}

impl ApiClient {
    /// Build a client that authenticates with the configured password grant.
    pub fn new(config: &ValidatedConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let authenticator = OAuthClient::with_client(config, client.clone());
        Ok(Self::with_parts(config, client, Arc::new(authenticator)))
    }

    /// Build a client around a custom authenticator.
    pub fn with_authenticator(
        config: &ValidatedConfig,
        authenticator: Arc<dyn Authenticator>,
    ) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_parts(config, client, authenticator))
    }

    fn with_parts(
        config: &ValidatedConfig,
        client: Client,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            base_url: config.host.clone(),
            per_page: config.per_page,
            client,
            tokens: Arc::new(TokenManager::new(authenticator)),
        }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Obtain a token now, surfacing bad credentials before any other call.
    pub async fn verify_credentials(&self) -> ApiResult<()> {
        self.tokens.valid_token().await?;
        Ok(())
    }

    fn entries_url(&self) -> String {
        format!("{}/api/entries", self.base_url)
    }

    fn entry_url(&self, id: EntryId) -> String {
        format!("{}/api/entries/{id}", self.base_url)
    }

    /// Attach a valid token to `request` and send it.
    ///
    /// A 401 answer drops the cached token so the next call re-authenticates.
    async fn send(&self, request: RequestBuilder) -> ApiResult<Response> {
        let token = self.tokens.valid_token().await?;
        let response = request
            .query(&[("access_token", token.access_token.as_str())])
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = parse_api_error(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
            return Err(ApiError::Unauthorized(message));
        }
        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl EntryGateway for ApiClient {
    async fn list_page(&self, page: u32, mode: RetrieveMode) -> ApiResult<EntryPage> {
        let page_param = page.to_string();
        let per_page_param = self.per_page.to_string();
        let request = self
            .client
            .get(self.entries_url())
            .query(&[
                ("perPage", per_page_param.as_str()),
                ("page", page_param.as_str()),
            ])
            .query(mode.query_params());

        let response = self.send(request).await?;
        let body = response.text().await?;
        parse_entry_page(&body)
    }

    async fn create(&self, url: &str) -> ApiResult<RemoteEntry> {
        let request = self.client.post(self.entries_url()).form(&[("url", url)]);
        let response = self.send(request).await?;
        let body = response.text().await?;
        parse_entry(&body)
    }

    async fn update(&self, id: EntryId, fields: &EntryUpdate) -> ApiResult<RemoteEntry> {
        let request = self
            .client
            .patch(self.entry_url(id))
            .form(&fields.form_fields());
        let response = self.send(request).await?;
        let body = response.text().await?;
        parse_entry(&body)
    }

    async fn delete(&self, id: EntryId) -> ApiResult<()> {
        let request = self.client.delete(self.entry_url(id));
        self.send(request).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload
            .error_description
            .or(payload.message)
            .or(payload.error)
        {
            return message.trim().to_string();
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::{AuthError, AuthResult, Token};

    struct StaticAuthenticator {
        calls: AtomicUsize,
        reject: bool,
    }

    #[async_trait]
    impl Authenticator for StaticAuthenticator {
        async fn authenticate(&self) -> AuthResult<Token> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(AuthError::Api("invalid_grant (400)".to_string()));
            }
            Ok(Token::from_grant("tok", 3600, Utc::now()))
        }
    }

    fn client_for(server: &MockServer, reject: bool) -> (ApiClient, Arc<StaticAuthenticator>) {
        let authenticator = Arc::new(StaticAuthenticator {
            calls: AtomicUsize::new(0),
            reject,
        });
        let config = ValidatedConfig {
            host: server.uri(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "reader".to_string(),
            password: "hunter2".to_string(),
            per_page: 2,
        };
        let client = ApiClient::with_authenticator(&config, authenticator.clone()).unwrap();
        (client, authenticator)
    }

    fn item(id: i64, starred: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": format!("Entry {id}"),
            "content": "<p>text</p>",
            "url": format!("https://example.com/{id}"),
            "domain_name": "example.com",
            "preview_picture": null,
            "created_at": "2024-01-01T00:00:00+0000",
            "updated_at": "2024-01-02T00:00:00+0000",
            "is_starred": starred,
            "is_archived": 0,
            "reading_time": 3
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_page_sends_token_paging_and_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entries"))
            .and(query_param("access_token", "tok"))
            .and(query_param("perPage", "2"))
            .and(query_param("page", "2"))
            .and(query_param("starred", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "page": 2,
                "pages": 3,
                "_embedded": { "items": [item(5, true), item(6, true)] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, false);
        let page = client.list_page(2, RetrieveMode::Starred).await.unwrap();

        assert_eq!(page.last_page, 3);
        let ids = page.items.iter().map(|entry| entry.id.get()).collect::<Vec<_>>();
        assert_eq!(ids, vec![5, 6]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_patches_flags_and_returns_entity() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/entries/9"))
            .and(body_string_contains("archive=1"))
            .and(body_string_contains("starred=0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(item(9, false)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, false);
        let entry = client
            .update(EntryId::new(9), &EntryUpdate::flags(true, false))
            .await
            .unwrap();
        assert_eq!(entry.id, EntryId::new(9));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_and_delete_hit_entry_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/entries"))
            .and(body_string_contains("url=https%3A%2F%2Fexample.com%2F3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(item(3, false)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/entries/3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(item(3, false)))
            .expect(1)
            .mount(&server)
            .await;

        let (client, authenticator) = client_for(&server, false);
        let created = client.create("https://example.com/3").await.unwrap();
        client.delete(created.id).await.unwrap();

        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn auth_failure_skips_network_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entries"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, true);
        let error = client.list_page(1, RetrieveMode::All).await.unwrap_err();
        assert!(matches!(error, ApiError::Authentication(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unauthorized_response_invalidates_token() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/entries/1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "The access token provided has expired."
            })))
            .mount(&server)
            .await;

        let (client, authenticator) = client_for(&server, false);
        let error = client.delete(EntryId::new(1)).await.unwrap_err();
        assert!(error.is_authentication());
        assert!(error.to_string().contains("expired"));
        assert!(!client.tokens().has_valid_token().await);

        let _ = client.delete(EntryId::new(1)).await;
        assert_eq!(authenticator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn server_error_and_garbage_body_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/entries"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/entries"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"oops\":true}"))
            .mount(&server)
            .await;

        let (client, _) = client_for(&server, false);
        let unavailable = client.list_page(1, RetrieveMode::All).await.unwrap_err();
        assert!(matches!(unavailable, ApiError::Http { status: 503, .. }));
        let garbage = client.list_page(2, RetrieveMode::All).await.unwrap_err();
        assert!(matches!(garbage, ApiError::Parse(_)));
    }
}
