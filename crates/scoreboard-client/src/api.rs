//! REST collaborator for `/api/game/...`
//!
//! Requests always carry `Content-Type: application/json`. A non-2xx status
//! fails with [`Error::HttpStatus`], whose message reads
//! `"{METHOD} {endpoint} failed: {status}"`. JSON responses are decoded;
//! anything else is returned as text.

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use scoreboard_core::prelude::*;
use scoreboard_core::{PortList, TeamId};

const API_PREFIX: &str = "/api/game";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Body of a successful response
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    Text(String),
}

impl ApiResponse {
    /// Decode a JSON body into `T`
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ApiResponse::Json(value) => Ok(serde_json::from_value(value)?),
            ApiResponse::Text(text) => Err(Error::http(format!(
                "expected a JSON response, got text: {}",
                text.chars().take(120).collect::<String>()
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            ApiResponse::Json(value) => value,
            ApiResponse::Text(text) => Value::String(text),
        }
    }
}

/// Game REST operations
#[trait_variant::make(GameApi: Send)]
pub trait LocalGameApi {
    /// `GET /api/game/`
    async fn get_state(&self) -> Result<ApiResponse>;

    /// `POST /api/game/`
    async fn reset(&self) -> Result<ApiResponse>;

    /// `PUT /api/game/`
    async fn update(&self, payload: &Value) -> Result<ApiResponse>;

    /// `GET /api/game/portNames`
    async fn list_ports(&self) -> Result<PortList>;

    /// `POST /api/game/portName`
    async fn set_port(&self, port_name: &str) -> Result<PortList>;

    /// `POST /api/game/{team}/penalty`
    async fn add_penalty(&self, team: TeamId, payload: &Value) -> Result<ApiResponse>;

    /// `DELETE /api/game/{team}/penalty/{id}`
    async fn delete_penalty(&self, team: TeamId, penalty_id: &str) -> Result<ApiResponse>;
}

/// [`GameApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpGameApi {
    client: Client,
    base: String,
}

impl HttpGameApi {
    /// `base_url` is the server origin, e.g. `http://localhost:8080`
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base: format!("{}{}", base_url.trim_end_matches('/'), API_PREFIX),
        }
    }

    /// Absolute URL for `endpoint`, relative to `/api/game/`
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        let trimmed = endpoint.strip_prefix('/').unwrap_or(endpoint);
        format!("{}/{}", self.base, trimmed)
    }

    async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let url = self.endpoint_url(endpoint);
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(body)?);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("{method} {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::http_status(method.as_str(), endpoint, status.as_u16()));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains(JSON_CONTENT_TYPE));

        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read body: {e}")))?;

        if is_json {
            Ok(ApiResponse::Json(serde_json::from_str(&text)?))
        } else {
            Ok(ApiResponse::Text(text))
        }
    }
}

impl GameApi for HttpGameApi {
    async fn get_state(&self) -> Result<ApiResponse> {
        self.request(Method::GET, "", None).await
    }

    async fn reset(&self) -> Result<ApiResponse> {
        self.request(Method::POST, "", None).await
    }

    async fn update(&self, payload: &Value) -> Result<ApiResponse> {
        self.request(Method::PUT, "", Some(payload)).await
    }

    async fn list_ports(&self) -> Result<PortList> {
        self.request(Method::GET, "portNames", None).await?.decode()
    }

    async fn set_port(&self, port_name: &str) -> Result<PortList> {
        let body = serde_json::json!({ "portName": port_name });
        self.request(Method::POST, "portName", Some(&body))
            .await?
            .decode()
    }

    async fn add_penalty(&self, team: TeamId, payload: &Value) -> Result<ApiResponse> {
        self.request(Method::POST, &format!("{team}/penalty"), Some(payload))
            .await
    }

    async fn delete_penalty(&self, team: TeamId, penalty_id: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, &format!("{team}/penalty/{penalty_id}"), None)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiResponse, GameApi, HttpGameApi};
    use scoreboard_core::{PortList, TeamId};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response; resolves to the raw request text
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let origin = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = String::new();
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                request.push_str(&String::from_utf8_lossy(&buf[..n]));
                if n == 0 || request_complete(&request) {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });
        (origin, handle)
    }

    fn request_complete(raw: &str) -> bool {
        let Some((head, body)) = raw.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .find_map(|l| {
                l.to_ascii_lowercase()
                    .strip_prefix("content-length:")
                    .map(|v| v.trim().parse::<usize>().unwrap_or(0))
            })
            .unwrap_or(0);
        body.len() >= length
    }

    #[test]
    fn test_endpoint_url_building() {
        let api = HttpGameApi::new("http://rink.local:8080/");
        assert_eq!(api.endpoint_url(""), "http://rink.local:8080/api/game/");
        assert_eq!(
            api.endpoint_url("/portNames"),
            "http://rink.local:8080/api/game/portNames"
        );
        assert_eq!(
            api.endpoint_url("home/penalty/7"),
            "http://rink.local:8080/api/game/home/penalty/7"
        );
    }

    #[test]
    fn test_decode_text_response_fails() {
        let err = ApiResponse::Text("ok".into()).decode::<PortList>().unwrap_err();
        assert!(err.to_string().contains("expected a JSON response"));
    }

    #[tokio::test]
    async fn test_list_ports_decodes_json() {
        let (origin, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"ports":["COM1","COM3"],"currentPort":"COM3"}"#,
        )
        .await;
        let api = HttpGameApi::new(&origin);

        let ports = api.list_ports().await.unwrap();
        assert_eq!(ports.ports, vec!["COM1", "COM3"]);
        assert_eq!(ports.current_port, "COM3");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/game/portNames HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
    }

    #[tokio::test]
    async fn test_non_success_status_reports_method_and_endpoint() {
        let (origin, server) = serve_once("503 Service Unavailable", "text/plain", "busy").await;
        let api = HttpGameApi::new(&origin);

        let err = api.delete_penalty(TeamId::Home, "p-1").await.unwrap_err();
        assert_eq!(err.to_string(), "DELETE home/penalty/p-1 failed: 503");
        assert_eq!(err.status(), Some(503));

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/game/home/penalty/p-1 HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_non_json_response_is_text() {
        let (origin, server) = serve_once("200 OK", "text/plain", "reset done").await;
        let api = HttpGameApi::new(&origin);

        let response = api.reset().await.unwrap();
        assert_eq!(response, ApiResponse::Text("reset done".into()));
        assert!(server.await.unwrap().starts_with("POST /api/game/ HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_set_port_sends_json_body() {
        let (origin, server) = serve_once(
            "200 OK",
            "application/json;charset=UTF-8",
            r#"{"ports":["COM3"],"currentPort":"COM3"}"#,
        )
        .await;
        let api = HttpGameApi::new(&origin);

        api.set_port("COM3").await.unwrap();
        let request = server.await.unwrap();
        assert!(request.ends_with(r#"{"portName":"COM3"}"#));
    }
}
