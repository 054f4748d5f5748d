//! OpenAI Realtime client secrets.
//!
//! A client secret is minted with `POST /v1/realtime/client_secrets` using the
//! server's API key. The request pins the session shape (model, output voice,
//! 24kHz PCM input and semantic VAD turn detection); the browser then connects
//! directly to OpenAI with the secret.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use zeroize::Zeroize;

use super::{TokenError, TokenResult, endpoint};

/// OpenAI API endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";

pub const CLIENT_SECRETS_PATH: &str = "/v1/realtime/client_secrets";

pub const DEFAULT_REALTIME_MODEL: &str = "gpt-realtime";

pub const DEFAULT_REALTIME_VOICE: &str = "marin";

/// Input audio sample rate in Hz (PCM 16-bit mono).
pub const INPUT_SAMPLE_RATE: u32 = 24000;

/// Field of the response body holding the secret.
const CLIENT_SECRET_FIELD: &str = "value";

/// Realtime session settings taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAIRealtimeSettings {
    pub model: String,
    pub voice: String,
}

impl Default for OpenAIRealtimeSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_REALTIME_MODEL.to_string(),
            voice: DEFAULT_REALTIME_VOICE.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ClientSecretRequest<'a> {
    session: SessionDescriptor<'a>,
}

#[derive(Debug, Serialize)]
struct SessionDescriptor<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    model: &'a str,
    audio: AudioConfig<'a>,
}

#[derive(Debug, Serialize)]
struct AudioConfig<'a> {
    output: AudioOutput<'a>,
    input: AudioInput,
}

#[derive(Debug, Serialize)]
struct AudioOutput<'a> {
    voice: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioInput {
    format: AudioFormat,
    turn_detection: TurnDetection,
}

#[derive(Debug, Serialize)]
struct AudioFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    rate: u32,
}

#[derive(Debug, Serialize)]
struct TurnDetection {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Issues OpenAI Realtime client secrets.
pub struct OpenAIClientSecretIssuer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: OpenAIRealtimeSettings,
}

impl Drop for OpenAIClientSecretIssuer {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl OpenAIClientSecretIssuer {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: OpenAIRealtimeSettings,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            settings,
        }
    }

    fn request_body(&self) -> ClientSecretRequest<'_> {
        ClientSecretRequest {
            session: SessionDescriptor {
                kind: "realtime",
                model: &self.settings.model,
                audio: AudioConfig {
                    output: AudioOutput {
                        voice: &self.settings.voice,
                    },
                    input: AudioInput {
                        format: AudioFormat {
                            kind: "audio/pcm",
                            rate: INPUT_SAMPLE_RATE,
                        },
                        turn_detection: TurnDetection {
                            kind: "semantic_vad",
                        },
                    },
                },
            },
        }
    }

    /// Request a new client secret.
    ///
    /// Only HTTP 200 counts as success. Any other status is returned as
    /// [`TokenError::Provider`] carrying the provider's body untouched.
    pub async fn issue(&self) -> TokenResult<String> {
        let response = self
            .client
            .post(endpoint(&self.base_url, CLIENT_SECRETS_PATH))
            .bearer_auth(&self.api_key)
            .json(&self.request_body())
            .send()
            .await
            .map_err(|e| {
                error!("OpenAI client secret request failed: {}", e);
                TokenError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!("Failed to read OpenAI client secret response: {}", e);
            TokenError::Unavailable(e.to_string())
        })?;

        if status != StatusCode::OK {
            error!("OpenAI client secret API error ({}): {}", status, body);
            return Err(TokenError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let value = extract_client_secret(&body)?;
        info!(model = %self.settings.model, "Issued OpenAI Realtime client secret");
        Ok(value)
    }
}

fn extract_client_secret(body: &str) -> TokenResult<String> {
    let json: Value = serde_json::from_str(body).map_err(|e| {
        error!("OpenAI client secret response is not JSON: {}", e);
        TokenError::Parse(e.to_string())
    })?;

    json.get(CLIENT_SECRET_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            error!("OpenAI client secret response has no '{CLIENT_SECRET_FIELD}' field");
            TokenError::Parse(format!("missing '{CLIENT_SECRET_FIELD}' field"))
        })
}
