//! HTTP client for the academic REST API.
//!
//! This module provides the `ApiClient` struct implementing `Backend`
//! over reqwest. All endpoints live under `{base_url}/academic`.

use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::ApiConfig;
use crate::models::{
    ClassRoom, Mentor, NewClassRoom, NewMentor, NewSession, Session, SessionStatus,
};

use super::{ApiError, ApiResult, Backend};

/// API client for the academic backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: format!("{}/academic", config.base_url.trim_end_matches('/')),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> ApiResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::Network(e.to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if a response is successful, classifying the body if not.
    async fn check_response(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read a successful response body as JSON. The body is fetched as
    /// text first so a shape mismatch reports a decode error without
    /// losing the status classification.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: Option<&str>) -> ApiResult<T> {
        let url = self.url(path);
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(&url)
            .headers(Self::auth_headers(token)?)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> ApiResult<T> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .headers(Self::auth_headers(token)?)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> ApiResult<T> {
        let url = self.url(path);
        debug!(url = %url, "PUT");
        let response = self
            .client
            .put(&url)
            .headers(Self::auth_headers(token)?)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn delete(&self, path: &str, token: Option<&str>) -> ApiResult<()> {
        let url = self.url(path);
        debug!(url = %url, "DELETE");
        let response = self
            .client
            .delete(&url)
            .headers(Self::auth_headers(token)?)
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }
}

impl Backend for ApiClient {
    async fn list_classrooms(&self) -> ApiResult<Vec<ClassRoom>> {
        self.get("/classroom", None).await
    }

    async fn get_classroom(&self, classroom_id: i64) -> ApiResult<ClassRoom> {
        self.get(&format!("/classrooms/{}", classroom_id), None).await
    }

    async fn list_mentors(&self, token: Option<&str>) -> ApiResult<Vec<Mentor>> {
        self.get("/mentor", token).await
    }

    async fn get_mentor(&self, mentor_id: i64, token: Option<&str>) -> ApiResult<Mentor> {
        self.get(&format!("/mentors/{}", mentor_id), token).await
    }

    async fn list_sessions(&self, token: Option<&str>) -> ApiResult<Vec<Session>> {
        self.get("/session", token).await
    }

    async fn get_session(&self, session_id: i64, token: Option<&str>) -> ApiResult<Session> {
        self.get(&format!("/session/{}", session_id), token).await
    }

    async fn create_classroom(
        &self,
        new: &NewClassRoom,
        token: Option<&str>,
    ) -> ApiResult<ClassRoom> {
        self.post("/classroom", new, token).await
    }

    async fn update_classroom(
        &self,
        updated: &ClassRoom,
        token: Option<&str>,
    ) -> ApiResult<ClassRoom> {
        self.put("/classroom", updated, token).await
    }

    async fn delete_classroom(&self, classroom_id: i64, token: Option<&str>) -> ApiResult<()> {
        self.delete(&format!("/classroom/{}", classroom_id), token).await
    }

    async fn create_mentor(&self, new: &NewMentor, token: Option<&str>) -> ApiResult<Mentor> {
        self.post("/mentor", new, token).await
    }

    async fn update_mentor(&self, updated: &Mentor, token: Option<&str>) -> ApiResult<Mentor> {
        self.put("/mentor", updated, token).await
    }

    async fn delete_mentor(&self, mentor_id: i64, token: Option<&str>) -> ApiResult<()> {
        self.delete(&format!("/mentor/{}", mentor_id), token).await
    }

    async fn create_session(&self, new: &NewSession, token: Option<&str>) -> ApiResult<Session> {
        self.post("/session", new, token).await
    }

    async fn update_session(
        &self,
        updated: &Session,
        status: SessionStatus,
        token: Option<&str>,
    ) -> ApiResult<Session> {
        let path = format!(
            "/session/{}?sessionStatus={}",
            updated.session_id, status
        );
        self.put(&path, updated, token).await
    }

    async fn delete_session(&self, session_id: i64, token: Option<&str>) -> ApiResult<()> {
        self.delete(&format!("/session/{}", session_id), token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ApiConfig::new("http://localhost:8080/");
        let client = ApiClient::new(&config).expect("client builds");
        assert_eq!(client.url("/mentor"), "http://localhost:8080/academic/mentor");
    }

    #[test]
    fn test_auth_headers_with_token() {
        let headers = ApiClient::auth_headers(Some("abc123")).expect("headers build");
        assert_eq!(
            headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer abc123")
        );
    }

    #[test]
    fn test_auth_headers_without_token() {
        let headers = ApiClient::auth_headers(None).expect("headers build");
        assert!(headers.is_empty());
    }
}
