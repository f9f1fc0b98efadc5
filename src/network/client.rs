//! HTTP client for the Infinity Events API

use super::wire::{
    AuthRequest, AuthResponse, RetrieveData, RetrieveRequest, RetrieveResponse, StatusData,
    StatusResponse, SubmitRequest, SubmitResponse,
};
use crate::config::OutgoingSettings;
use crate::error::SearchError;
use anyhow::Result;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Thin reqwest wrapper configured from the outgoing settings.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .gzip(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    /// POST a JSON body, optionally with a bearer token
    pub async fn post_json<B: serde::Serialize>(
        &self,
        url: Url,
        body: &B,
        token: Option<&str>,
    ) -> Result<Response, SearchError> {
        let mut req = self.client.post(url).json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    /// GET with a bearer token
    pub async fn get(&self, url: Url, token: &str) -> Result<Response, SearchError> {
        Ok(self.client.get(url).bearer_auth(token).send().await?)
    }
}

/// Client for the four upstream endpoints, bound to one regional host.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
}

impl ApiClient {
    pub fn new(http: HttpClient, base_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, SearchError> {
        self.base_url
            .join(path)
            .map_err(|e| SearchError::Protocol(format!("bad endpoint path {}: {}", path, e)))
    }

    /// Exchange credentials for a bearer token.
    pub async fn authenticate(
        &self,
        client_id: &str,
        access_key: &str,
    ) -> Result<String, SearchError> {
        let url = self.endpoint("/auth/external")?;
        let body = AuthRequest {
            client_id: client_id.to_string(),
            access_key: access_key.to_string(),
        };
        debug!("exchanging credentials at {}", url);

        let response = self.http.post_json(url, &body, None).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            // Rejected credentials, not a transient condition
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Auth(format!("HTTP {}: {}", status, body)));
        }
        let parsed: AuthResponse = Self::parse_response(response).await?;
        match parsed.data {
            Some(data) if parsed.success => Ok(data.token),
            _ => Err(SearchError::Auth("credential exchange rejected".to_string())),
        }
    }

    /// Submit a search, returning the server-assigned task id.
    pub async fn submit(
        &self,
        token: &str,
        request: &SubmitRequest,
    ) -> Result<String, SearchError> {
        let url = self.endpoint("/app/laas-logs-api/api/logs_query")?;
        debug!(filter = %request.filter, "submitting search");

        let response = self.http.post_json(url, request, Some(token)).await?;
        let parsed: SubmitResponse = Self::parse_response(response).await?;
        match parsed.data {
            Some(data) if parsed.success => Ok(data.task_id),
            _ => Err(SearchError::Submission(
                "search request rejected by upstream".to_string(),
            )),
        }
    }

    /// Fetch the status of an in-flight search task.
    pub async fn task_status(&self, token: &str, task_id: &str) -> Result<StatusData, SearchError> {
        let url = self.endpoint(&format!("/app/laas-logs-api/api/logs_query/{}", task_id))?;

        let response = self.http.get(url, token).await?;
        let parsed: StatusResponse = Self::parse_response(response).await?;
        match parsed.data {
            Some(data) if parsed.success => Ok(data),
            _ => Err(SearchError::Protocol("status check failed".to_string())),
        }
    }

    /// Retrieve one results page.
    pub async fn retrieve(
        &self,
        token: &str,
        task_id: &str,
        page_token: &str,
    ) -> Result<RetrieveData, SearchError> {
        let url = self.endpoint("/app/laas-logs-api/api/logs_query/retrieve")?;
        let body = RetrieveRequest {
            task_id: task_id.to_string(),
            page_token: page_token.to_string(),
        };

        let response = self.http.post_json(url, &body, Some(token)).await?;
        let parsed: RetrieveResponse = Self::parse_response(response).await?;
        match parsed.data {
            Some(data) if parsed.success => Ok(data),
            _ => Err(SearchError::Protocol("log retrieval failed".to_string())),
        }
    }

    /// Map the HTTP status, then decode the JSON envelope.
    async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, SearchError> {
        let status = response.status();
        match status.as_u16() {
            200..=299 => {}
            401 => return Err(SearchError::Unauthorized),
            429 => {
                let retry_after = parse_retry_after(&response);
                return Err(SearchError::Throttled { retry_after });
            }
            code => {
                let body = response.text().await.unwrap_or_default();
                return Err(SearchError::Http { status: code, body });
            }
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SearchError::Protocol(format!("malformed response body: {}", e)))
    }
}

/// Parse a `Retry-After` header, seconds form only.
fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> ApiClient {
        ApiClient::new(HttpClient::new().unwrap(), &server.uri()).unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/external"))
            .and(body_json(serde_json::json!({
                "clientId": "id",
                "accessKey": "key"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"token": "tok-1"}
            })))
            .mount(&server)
            .await;

        let token = api(&server).authenticate("id", "key").await.unwrap();
        assert_eq!(token, "tok-1");
    }

    #[tokio::test]
    async fn test_authenticate_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/external"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = api(&server).authenticate("id", "bad").await.unwrap_err();
        assert!(matches!(err, SearchError::Auth(_)));
    }

    #[tokio::test]
    async fn test_submit_maps_401() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/app/laas-logs-api/api/logs_query"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let request = SubmitRequest {
            filter: "*".to_string(),
            limit: 10_000,
            page_limit: 100,
            timeframe: crate::network::wire::Timeframe {
                start_time: "2024-06-14T12:00:00Z".to_string(),
                end_time: "2024-06-15T12:00:00Z".to_string(),
            },
            accounts: None,
        };
        let err = api(&server).submit("tok", &request).await.unwrap_err();
        assert!(matches!(err, SearchError::Unauthorized));
    }

    #[tokio::test]
    async fn test_429_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/laas-logs-api/api/logs_query/t1"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "3"))
            .mount(&server)
            .await;

        let err = api(&server).task_status("tok", "t1").await.unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert_eq!(err.status(), Some(429));
    }

    #[tokio::test]
    async fn test_envelope_failure_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app/laas-logs-api/api/logs_query/t1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": false})),
            )
            .mount(&server)
            .await;

        let err = api(&server).task_status("tok", "t1").await.unwrap_err();
        assert!(matches!(err, SearchError::Protocol(_)));
    }
}
