//! Clients for the remote word-cloud renderer and the image host.
//!
//! Both endpoints wrap their payload as `{"code": 200, "data": ...}`; a call
//! only succeeds with HTTP 200 and an application code of 200.

use std::fmt;
use std::path::Path;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const SUCCESS_CODE: i64 = 200;

#[derive(Debug)]
pub enum ApiError {
    Http(String),
    Status { status: StatusCode, body: String },
    Code(i64),
    Parse(String),
    /// The response had no usable value at this field.
    Missing(&'static str),
    ReadFile(std::io::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "HTTP error: {e}"),
            ApiError::Status { status, body } => write!(f, "API error {status}: {body}"),
            ApiError::Code(code) => write!(f, "API returned code {code}"),
            ApiError::Parse(e) => write!(f, "Parse error: {e}"),
            ApiError::Missing(field) => write!(f, "Response has no {field}"),
            ApiError::ReadFile(e) => write!(f, "Failed to read image: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::ReadFile(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct CloudRequest<'a> {
    words: &'a str,
    count: u32,
}

#[derive(Deserialize, Debug)]
struct ApiEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: serde_json::Value,
}

pub struct WordCloudApi {
    render_url: Url,
    upload_url: Url,
    client: reqwest::Client,
}

impl WordCloudApi {
    pub fn new(render_url: Url, upload_url: Url) -> Self {
        Self {
            render_url,
            upload_url,
            client: reqwest::Client::new(),
        }
    }

    /// Ask the renderer for a cloud of the `count` top words of `words`.
    /// Returns the base64-encoded PNG.
    pub async fn render(&self, words: &str, count: u32) -> Result<String, ApiError> {
        info!("☁️ Rendering word cloud ({} chars, top {})", words.chars().count(), count);

        let response = self
            .client
            .post(self.render_url.clone())
            .json(&CloudRequest { words, count })
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let envelope = read_envelope(response).await?;
        envelope
            .data
            .get("image")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::Missing("data.image"))
    }

    /// Upload a PNG as multipart field `file`. Returns the hosted URL.
    pub async fn upload(&self, path: &Path) -> Result<String, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(ApiError::ReadFile)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("wordcloud.png")
            .to_string();

        info!("📤 Uploading {} ({} bytes)", file_name, bytes.len());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ApiError::Http(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.upload_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let envelope = read_envelope(response).await?;
        envelope
            .data
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ApiError::Missing("data"))
    }
}

async fn read_envelope(response: reqwest::Response) -> Result<ApiEnvelope, ApiError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::Http(format!("failed to read response: {e}")))?;

    debug!("Word cloud API response status: {status}");

    if status != StatusCode::OK {
        return Err(ApiError::Status { status, body });
    }

    let envelope: ApiEnvelope =
        serde_json::from_str(&body).map_err(|e| ApiError::Parse(e.to_string()))?;
    if envelope.code != SUCCESS_CODE {
        return Err(ApiError::Code(envelope.code));
    }
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn api(server: &MockServer) -> WordCloudApi {
        WordCloudApi::new(
            Url::parse(&server.url("/api/wordcloud")).unwrap(),
            Url::parse(&server.url("/api/uploadImg")).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_render_sends_words_and_count() {
        let server = MockServer::start();
        let render = server.mock(|when, then| {
            when.method(POST)
                .path("/api/wordcloud")
                .json_body(json!({"words": "rust rust tokio ", "count": 12}));
            then.status(200)
                .json_body(json!({"code": 200, "data": {"image": "aGVsbG8="}}));
        });

        let image = api(&server).render("rust rust tokio ", 12).await.unwrap();
        assert_eq!(image, "aGVsbG8=");
        render.assert_calls(1);
    }

    #[tokio::test]
    async fn test_render_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/wordcloud");
            then.status(502).body("bad gateway");
        });

        let err = api(&server).render("x ", 30).await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status, .. } if status == StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn test_render_application_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/wordcloud");
            then.status(200).json_body(json!({"code": 500, "msg": "too few words"}));
        });

        let err = api(&server).render("x ", 30).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(500)));
    }

    #[tokio::test]
    async fn test_render_missing_image() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/wordcloud");
            then.status(200).json_body(json!({"code": 200, "data": {}}));
        });

        let err = api(&server).render("x ", 30).await.unwrap_err();
        assert!(matches!(err, ApiError::Missing("data.image")));
    }

    #[tokio::test]
    async fn test_render_garbage_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/wordcloud");
            then.status(200).body("<html>oops</html>");
        });

        let err = api(&server).render("x ", 30).await.unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn test_upload_returns_url() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST).path("/api/uploadImg");
            then.status(200)
                .json_body(json!({"code": 200, "data": "https://img.example/x.png"}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("-1_20240307.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let url = api(&server).upload(&path).await.unwrap();
        assert_eq!(url, "https://img.example/x.png");
        upload.assert_calls(1);
    }

    #[tokio::test]
    async fn test_upload_application_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/uploadImg");
            then.status(200).json_body(json!({"code": 413, "data": null}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"\x89PNG").unwrap();

        let err = api(&server).upload(&path).await.unwrap_err();
        assert!(matches!(err, ApiError::Code(413)));
    }

    #[tokio::test]
    async fn test_upload_missing_file_skips_request() {
        let server = MockServer::start();
        let upload = server.mock(|when, then| {
            when.method(POST).path("/api/uploadImg");
            then.status(200).json_body(json!({"code": 200, "data": "https://img.example/x.png"}));
        });

        let err = api(&server).upload(Path::new("/nonexistent/a.png")).await.unwrap_err();
        assert!(matches!(err, ApiError::ReadFile(_)));
        upload.assert_calls(0);
    }
}
