//! HTTP client for the capture endpoint, as used from the page.

use std::fmt;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::errors::ErrorResponse;
use crate::models::{
    CaptureStore, CreateCaptureRequest, CreateCaptureResponse, DeleteResponse, SuccessResponse,
    UpdateRequest,
};

#[derive(Debug)]
pub enum ClientError {
    /// Connection refused, reset, timed out...
    Transport(reqwest::Error),
    /// The endpoint answered with a non-success status.
    Status { status: u16, message: String },
    /// The body was not what the endpoint promises.
    Decode(reqwest::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(e) => write!(f, "Request failed: {}", e),
            ClientError::Status { status, message } => write!(f, "{} ({})", message, status),
            ClientError::Decode(e) => write!(f, "Unexpected response: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err)
        } else {
            ClientError::Transport(err)
        }
    }
}

/// Talks to one mounted capture endpoint, e.g. `http://localhost:5173/__see-my-clicks`.
#[derive(Debug, Clone)]
pub struct StoreClient {
    http: Client,
    endpoint: String,
}

impl StoreClient {
    pub fn new(endpoint: &str) -> Self {
        Self::with_client(Client::new(), endpoint)
    }

    pub fn with_client(http: Client, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint for a script URL ending in `/client.js`.
    pub fn from_script_url(script_url: &str) -> Self {
        let endpoint = script_url
            .split(['?', '#'])
            .next()
            .unwrap_or(script_url)
            .trim_end_matches("/client.js");
        Self::new(endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Read the store. Without `keep` the server clears it after answering.
    pub async fn fetch_store(&self, keep: bool) -> Result<CaptureStore, ClientError> {
        let keep = if keep { "true" } else { "false" };
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("keep", keep)])
            .send()
            .await?;
        decode(response).await
    }

    /// Read the store and remove only `click_ids` from it.
    pub async fn consume(&self, click_ids: &[String]) -> Result<CaptureStore, ClientError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("ids", click_ids.join(","))])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn create(
        &self,
        request: &CreateCaptureRequest,
    ) -> Result<CreateCaptureResponse, ClientError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        decode(response).await
    }

    pub async fn update_comment(
        &self,
        click_id: &str,
        comment: Option<String>,
    ) -> Result<(), ClientError> {
        self.put(&UpdateRequest::comment(click_id, comment)).await
    }

    pub async fn update_session_color(&self, session_id: &str, color: &str) -> Result<(), ClientError> {
        self.put(&UpdateRequest::session_color(session_id, color)).await
    }

    pub async fn delete_click(&self, click_id: &str) -> Result<DeleteResponse, ClientError> {
        let response = self
            .http
            .delete(&self.endpoint)
            .query(&[("clickId", click_id)])
            .send()
            .await?;
        decode(response).await
    }

    pub async fn clear(&self) -> Result<DeleteResponse, ClientError> {
        let response = self.http.delete(&self.endpoint).send().await?;
        decode(response).await
    }

    async fn put(&self, body: &UpdateRequest) -> Result<(), ClientError> {
        let response = self.http.put(&self.endpoint).json(body).send().await?;
        let _: SuccessResponse = decode(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Request failed").to_string());
        return Err(ClientError::Status {
            status: status.as_u16(),
            message,
        });
    }
    response.json().await.map_err(ClientError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_script_url() {
        let client = StoreClient::from_script_url("http://localhost:5173/__see-my-clicks/client.js?v=3");
        assert_eq!(client.endpoint(), "http://localhost:5173/__see-my-clicks");

        let client = StoreClient::new("http://localhost:7777/__see-my-clicks/");
        assert_eq!(client.endpoint(), "http://localhost:7777/__see-my-clicks");
    }

    #[test]
    fn test_status_error_display() {
        let err = ClientError::Status {
            status: 404,
            message: "Click abc not found".to_string(),
        };
        assert_eq!(err.to_string(), "Click abc not found (404)");
    }
}
