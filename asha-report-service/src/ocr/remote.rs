//! OCR.space client: multipart upload with language and file-type hints.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ExtractError, RemoteEngine};
use crate::{languages, models::CapturedImage};

const REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteOcrClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl RemoteOcrClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RemoteEngine for RemoteOcrClient {
    async fn parse_image(
        &self,
        image: &CapturedImage,
        language: &str,
    ) -> Result<String, ExtractError> {
        let bytes = image
            .decode()
            .map_err(|e| ExtractError::InvalidImage(e.to_string()))?;

        debug!(
            file = %image.file_name,
            size = bytes.len(),
            "sending image to OCR API"
        );

        let part = Part::bytes(bytes)
            .file_name(image.file_name.clone())
            .mime_str(&image.mime_type)
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        let form = Form::new()
            .part("file", part)
            .text("apikey", self.api_key.clone())
            .text("language", languages::engine_code(language).to_string())
            .text("isOverlayRequired", "false")
            .text("filetype", image.file_type().to_string());

        let response = self
            .http
            .post(&self.base_url)
            .timeout(REMOTE_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ExtractError::Request(format!(
                "OCR API returned {}",
                response.status()
            )));
        }

        let body: OcrSpaceResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::Request(e.to_string()))?;

        if body.is_errored_on_processing {
            return Err(ExtractError::Upstream(body.error_message()));
        }

        let text = body
            .parsed_results
            .as_deref()
            .unwrap_or_default()
            .first()
            .map(|result| result.parsed_text.clone())
            .ok_or(ExtractError::NoResults)?;

        if text.trim().is_empty() {
            return Err(ExtractError::BlankText);
        }

        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct OcrSpaceResponse {
    #[serde(default)]
    is_errored_on_processing: bool,
    #[serde(default)]
    error_message: Option<ErrorMessage>,
    #[serde(default)]
    parsed_results: Option<Vec<ParsedResult>>,
}

impl OcrSpaceResponse {
    fn error_message(&self) -> String {
        match &self.error_message {
            Some(ErrorMessage::One(message)) => message.clone(),
            Some(ErrorMessage::Many(messages)) => messages.join("; "),
            None => "unknown processing error".to_string(),
        }
    }
}

// The service reports errors either as a single string or as a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParsedResult {
    #[serde(default)]
    parsed_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_successful_payload() {
        let body: OcrSpaceResponse = serde_json::from_str(
            r#"{
                "ParsedResults": [{"ParsedText": "BP: 140/90"}],
                "IsErroredOnProcessing": false
            }"#,
        )
        .unwrap();
        assert!(!body.is_errored_on_processing);
        assert_eq!(body.parsed_results.unwrap()[0].parsed_text, "BP: 140/90");
    }

    #[test]
    fn error_messages_come_as_string_or_list() {
        let single: OcrSpaceResponse = serde_json::from_str(
            r#"{"IsErroredOnProcessing": true, "ErrorMessage": "Timed out"}"#,
        )
        .unwrap();
        assert_eq!(single.error_message(), "Timed out");

        let many: OcrSpaceResponse = serde_json::from_str(
            r#"{"IsErroredOnProcessing": true, "ErrorMessage": ["Bad file", "Unsupported type"]}"#,
        )
        .unwrap();
        assert_eq!(many.error_message(), "Bad file; Unsupported type");
    }

    #[test]
    fn missing_fields_default_cleanly() {
        let body: OcrSpaceResponse = serde_json::from_str("{}").unwrap();
        assert!(!body.is_errored_on_processing);
        assert!(body.parsed_results.is_none());
        assert_eq!(body.error_message(), "unknown processing error");
    }
}
