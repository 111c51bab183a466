use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::ocr::NO_TEXT_FOUND;
use super::{ExternalStep, StepError};
use crate::api::job::models::strip_nul;
use crate::config::TranslatorConfig;

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// Translates text through the DeepL `/v2/translate` endpoint
pub struct TranslateStep {
    client: reqwest::Client,
    endpoint: String,
    auth_scheme: String,
    api_key: SecretString,
    source_lang: String,
    target_lang: String,
    timeout: Duration,
}

impl TranslateStep {
    pub fn new(config: TranslatorConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
            auth_scheme: config.auth_scheme,
            api_key: config.api_key,
            source_lang: config.source_lang,
            target_lang: config.target_lang,
            timeout,
        })
    }

    fn request_error(&self, e: reqwest::Error) -> StepError {
        if e.is_timeout() {
            StepError::Timeout {
                step: "translate".to_string(),
                after: self.timeout,
            }
        } else {
            StepError::Transport(e)
        }
    }

    fn parse_body(status: u16, body: &str) -> Result<String, StepError> {
        let parsed: TranslateResponse =
            serde_json::from_str(body).map_err(|e| StepError::MalformedResponse {
                status,
                reason: e.to_string(),
            })?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| strip_nul(&t.text))
            .ok_or_else(|| StepError::MalformedResponse {
                status,
                reason: "empty translations list".to_string(),
            })
    }
}

#[async_trait]
impl ExternalStep for TranslateStep {
    type Input = str;
    type Output = String;

    fn name(&self) -> &str {
        "translate"
    }

    async fn run(&self, text: &str) -> Result<String, StepError> {
        if text == NO_TEXT_FOUND {
            info!("Skipping translation of OCR placeholder text");
            return Ok(text.to_string());
        }

        debug!(endpoint = %self.endpoint, chars = text.chars().count(), "Requesting translation");
        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", self.auth_scheme, self.api_key.expose_secret()),
            )
            .form(&[
                ("text", text),
                ("source_lang", self.source_lang.as_str()),
                ("target_lang", self.target_lang.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.request_error(e)
            } else {
                StepError::MalformedResponse {
                    status: status.as_u16(),
                    reason: format!("failed to read body: {}", e),
                }
            }
        })?;
        if !status.is_success() {
            error!(status = status.as_u16(), "Translation API call failed");
            return Err(StepError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_body(status.as_u16(), &body)
    }
}
