//! Gemini Live ephemeral auth tokens.
//!
//! Tokens are created with `POST /v1alpha/auth_tokens`. Each token is locked
//! to a live-connect setup (model, response modality, system instruction and,
//! for authenticated callers, the voice and language), caps the number of
//! sessions it may open, and expires one hour after issue.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info};
use zeroize::Zeroize;

use super::{TokenError, TokenResult, endpoint};

/// Gemini API endpoint.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Token creation path (the endpoint is only exposed on v1alpha).
pub const AUTH_TOKENS_PATH: &str = "/v1alpha/auth_tokens";

/// Model the token is locked to. Clients must connect with the same model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-live-001";

pub const DEFAULT_GEMINI_VOICE: &str = "Aoede";

pub const DEFAULT_GEMINI_LANGUAGE: &str = "en-US";

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a friendly woman calling your friend, who is an office worker that loves badminton. You are already at 'The Local Cafe' waiting for her. Start the conversation by greeting her and asking for her ETA.";

/// How long an issued token (and a session opened with it) stays valid.
pub const TOKEN_LIFETIME: time::Duration = time::Duration::hours(1);

/// Which caller class the token is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPolicy {
    /// Caller presented the backend API key
    Authenticated,
    /// Unauthenticated legacy route
    Legacy,
}

impl TokenPolicy {
    /// Number of sessions the token may open.
    pub fn uses(&self) -> u32 {
        match self {
            Self::Authenticated => 20,
            Self::Legacy => 10,
        }
    }

    /// Whether the voice and language are pinned in the token.
    pub fn pins_speech_config(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// Response modalities requested from the live model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
}

/// Live session settings taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeminiLiveSettings {
    pub model: String,
    pub voice: String,
    pub language: String,
    pub system_instruction: String,
}

impl Default for GeminiLiveSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            voice: DEFAULT_GEMINI_VOICE.to_string(),
            language: DEFAULT_GEMINI_LANGUAGE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Voice selection echoed to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechSettings {
    pub voice_name: String,
    pub language_code: String,
}

/// The live-connect configuration the token is locked to.
///
/// Returned to the caller so the client connects with matching settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveSessionConfig {
    pub model: String,
    pub response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechSettings>,
    pub system_instruction: String,
}

/// A freshly issued token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedGeminiToken {
    /// Opaque token name (`auth_tokens/...`), used by the client as its API key
    pub token: String,
    pub config: LiveSessionConfig,
}

// Wire types for the auth_tokens request

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthTokenRequest {
    uses: u32,
    expire_time: String,
    new_session_expire_time: String,
    bidi_generate_content_setup: BidiGenerateContentSetup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BidiGenerateContentSetup {
    model: String,
    generation_config: GenerationConfig,
    system_instruction: Content,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<Modality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<WireSpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSpeechConfig {
    voice_config: VoiceConfig,
    language_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct AuthTokenResponse {
    #[serde(default)]
    name: Option<String>,
}

/// Issues Gemini Live auth tokens.
pub struct GeminiTokenIssuer {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    settings: GeminiLiveSettings,
}

impl Drop for GeminiTokenIssuer {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl GeminiTokenIssuer {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: GeminiLiveSettings,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            settings,
        }
    }

    /// The live-connect configuration a token issued under `policy` pins.
    pub fn live_config(&self, policy: TokenPolicy) -> LiveSessionConfig {
        LiveSessionConfig {
            model: self.settings.model.clone(),
            response_modalities: vec![Modality::Audio],
            speech_config: policy.pins_speech_config().then(|| SpeechSettings {
                voice_name: self.settings.voice.clone(),
                language_code: self.settings.language.clone(),
            }),
            system_instruction: self.settings.system_instruction.clone(),
        }
    }

    fn build_request(
        &self,
        config: &LiveSessionConfig,
        policy: TokenPolicy,
        now: OffsetDateTime,
    ) -> TokenResult<AuthTokenRequest> {
        let expire_time = (now + TOKEN_LIFETIME)
            .format(&Rfc3339)
            .map_err(|e| TokenError::InvalidRequest(format!("Failed to format expiry: {e}")))?;

        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        Ok(AuthTokenRequest {
            uses: policy.uses(),
            new_session_expire_time: expire_time.clone(),
            expire_time,
            bidi_generate_content_setup: BidiGenerateContentSetup {
                model,
                generation_config: GenerationConfig {
                    response_modalities: config.response_modalities.clone(),
                    speech_config: config.speech_config.as_ref().map(|speech| WireSpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: speech.voice_name.clone(),
                            },
                        },
                        language_code: speech.language_code.clone(),
                    }),
                },
                system_instruction: Content {
                    parts: vec![Part {
                        text: config.system_instruction.clone(),
                    }],
                },
            },
        })
    }

    /// Request a new token from Gemini.
    pub async fn issue(&self, policy: TokenPolicy) -> TokenResult<IssuedGeminiToken> {
        let config = self.live_config(policy);
        let request = self.build_request(&config, policy, OffsetDateTime::now_utc())?;

        let response = self
            .client
            .post(endpoint(&self.base_url, AUTH_TOKENS_PATH))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini auth token request failed: {}", e);
                TokenError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Gemini auth token API error ({}): {}", status, body);
            return Err(TokenError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: AuthTokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini auth token response: {}", e);
            TokenError::Parse(e.to_string())
        })?;

        let token = parsed
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TokenError::Parse("response has no token name".to_string()))?;

        info!(
            uses = policy.uses(),
            model = %config.model,
            "Issued Gemini Live auth token"
        );

        Ok(IssuedGeminiToken { token, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn issuer() -> GeminiTokenIssuer {
        GeminiTokenIssuer::new(
            reqwest::Client::new(),
            GEMINI_BASE_URL,
            "test-key",
            GeminiLiveSettings::default(),
        )
    }

    fn fixed_now() -> OffsetDateTime {
        // 2023-11-14T22:13:20Z
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn test_policy_uses() {
        assert_eq!(TokenPolicy::Authenticated.uses(), 20);
        assert_eq!(TokenPolicy::Legacy.uses(), 10);
    }

    #[test]
    fn test_authenticated_request_pins_speech_config() {
        let issuer = issuer();
        let config = issuer.live_config(TokenPolicy::Authenticated);
        let request = issuer
            .build_request(&config, TokenPolicy::Authenticated, fixed_now())
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["uses"], 20);
        assert_eq!(body["expireTime"], "2023-11-14T23:13:20Z");
        assert_eq!(body["newSessionExpireTime"], "2023-11-14T23:13:20Z");

        let setup = &body["bidiGenerateContentSetup"];
        assert_eq!(setup["model"], "models/gemini-2.0-flash-live-001");
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"],
            json!({
                "voiceConfig": {"prebuiltVoiceConfig": {"voiceName": "Aoede"}},
                "languageCode": "en-US"
            })
        );
        assert_eq!(
            setup["systemInstruction"]["parts"][0]["text"],
            DEFAULT_SYSTEM_INSTRUCTION
        );
    }

    #[test]
    fn test_legacy_request_omits_speech_config() {
        let issuer = issuer();
        let config = issuer.live_config(TokenPolicy::Legacy);
        let request = issuer
            .build_request(&config, TokenPolicy::Legacy, fixed_now())
            .unwrap();
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["uses"], 10);
        assert_eq!(
            body["bidiGenerateContentSetup"]["generationConfig"]["speechConfig"],
            Value::Null
        );
    }

    #[test]
    fn test_model_prefix_not_doubled() {
        let issuer = GeminiTokenIssuer::new(
            reqwest::Client::new(),
            GEMINI_BASE_URL,
            "test-key",
            GeminiLiveSettings {
                model: "models/gemini-live-2.5-flash-preview".to_string(),
                ..Default::default()
            },
        );
        let config = issuer.live_config(TokenPolicy::Legacy);
        let request = issuer
            .build_request(&config, TokenPolicy::Legacy, fixed_now())
            .unwrap();

        assert_eq!(
            request.bidi_generate_content_setup.model,
            "models/gemini-live-2.5-flash-preview"
        );
    }

    #[test]
    fn test_live_config_serializes_snake_case() {
        let config = issuer().live_config(TokenPolicy::Authenticated);
        let value = serde_json::to_value(&config).unwrap();

        assert_eq!(value["model"], DEFAULT_GEMINI_MODEL);
        assert_eq!(value["response_modalities"], json!(["AUDIO"]));
        assert_eq!(value["speech_config"]["voice_name"], "Aoede");
        assert_eq!(value["speech_config"]["language_code"], "en-US");
    }
}
