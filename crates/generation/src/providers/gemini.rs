use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::ProviderError;
use crate::models::{
    AnalysisRequest, ProviderKind, RefineRequest, RefinedPrompt, ResponseTelemetry, RewriteGoal,
    ShotAnalysis,
};
use crate::service::ShotAnalyst;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Topic fallback when the model omits one, matching what the rest of the
/// pipeline labels an unnamed beat.
const DEFAULT_TOPIC: &str = "Sequence Segment";

#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-3-flash-preview".to_string(),
            temperature: 0.7,
        }
    }
}

#[derive(Debug)]
pub struct GeminiAnalyst {
    config: GeminiConfig,
    agent: ureq::Agent,
}

impl GeminiAnalyst {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        if config.api_key.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "Gemini API key is required.".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(ProviderError::Configuration(
                "Gemini model name is required.".to_string(),
            ));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(20))
            .timeout_read(Duration::from_secs(120))
            .timeout_write(Duration::from_secs(20))
            .build();
        Ok(Self { config, agent })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            GEMINI_API_BASE.trim_end_matches('/'),
            self.config.model.trim(),
            urlencoding::encode(self.config.api_key.trim())
        )
    }

    fn execute(&self, payload: &Value) -> Result<(String, ResponseTelemetry), ProviderError> {
        let start = Instant::now();
        let response = self
            .agent
            .post(&self.endpoint())
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .set("X-Goog-Api-Key", self.config.api_key.trim())
            .send_string(&payload.to_string())
            .map_err(map_http_error)?;
        let elapsed = start.elapsed();
        let body = response.into_string().map_err(|err| {
            ProviderError::transport(format!("Read Gemini response failed: {err}"))
        })?;
        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|err| {
            ProviderError::invalid_response(format!(
                "Invalid Gemini response JSON: {err}; raw: {body}"
            ))
        })?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .map(|parts| {
                parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| ProviderError::invalid_response("Gemini response had no candidates."))?;
        let telemetry = ResponseTelemetry {
            provider: ProviderKind::Gemini.as_str().to_string(),
            model: self.config.model.clone(),
            input_tokens: parsed
                .usage_metadata
                .as_ref()
                .and_then(|m| m.prompt_token_count),
            output_tokens: parsed
                .usage_metadata
                .as_ref()
                .and_then(|m| m.candidates_token_count),
            total_tokens: parsed
                .usage_metadata
                .as_ref()
                .and_then(|m| m.total_token_count),
            latency: Some(elapsed),
        };
        Ok((text, telemetry))
    }
}

fn map_http_error(err: ureq::Error) -> ProviderError {
    match err {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            match code {
                401 | 403 => ProviderError::Authentication(format!(
                    "Gemini rejected the credential (HTTP {code}): {body}"
                )),
                429 => ProviderError::RateLimited(format!(
                    "Gemini rate limit hit (HTTP 429): {body}"
                )),
                _ => ProviderError::Transport(format!(
                    "Gemini request failed with HTTP {code}: {body}"
                )),
            }
        }
        other => ProviderError::transport(format!("Gemini request failed: {other}")),
    }
}

fn analysis_instruction(style_directive: &str) -> String {
    format!(
        "Cinematic Sequence Analyzer. Style: {style_directive}. \
         Bridge the two frames with logical, high-fidelity motion. Output JSON."
    )
}

fn rewrite_instruction(goal: &RewriteGoal) -> String {
    match goal {
        RewriteGoal::Aesthetic { directive } => format!(
            "You are an aesthetic master for cinematic video sequences. \
             Rewrite each action prompt so it is extremely descriptive and \
             stylistically locked to this vibe: {directive}. \
             Return a JSON array with one entry per input shot."
        ),
        RewriteGoal::EngineOptimize => "You are the render engine optimizer. \
             For each action prompt: replace copyrighted characters and brand \
             names with descriptive equivalents, condense rambling text into \
             the dense tokens the engine prioritizes (motion keywords, lighting \
             descriptors, camera angles, atmospheric physics), and keep each \
             prompt to one continuous action or transformation. \
             Return a JSON array with one entry per input shot."
            .to_string(),
    }
}

impl ShotAnalyst for GeminiAnalyst {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<ShotAnalysis, ProviderError> {
        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": analysis_instruction(&request.style_directive) },
                    { "inlineData": {
                        "mimeType": request.source.mime(),
                        "data": request.source.base64_payload(),
                    }},
                    { "inlineData": {
                        "mimeType": request.target.mime(),
                        "data": request.target.base64_payload(),
                    }},
                ]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "topic": { "type": "STRING" },
                        "analysis": { "type": "STRING" },
                        "prompt": { "type": "STRING" },
                    },
                    "required": ["topic", "analysis", "prompt"],
                },
            },
        });
        let (text, telemetry) = self.execute(&payload)?;
        let parsed: AnalysisPayload = serde_json::from_str(text.trim()).map_err(|err| {
            ProviderError::invalid_response(format!(
                "Gemini analysis was not the expected JSON object: {err}; raw: {text}"
            ))
        })?;
        Ok(ShotAnalysis {
            topic: if parsed.topic.trim().is_empty() {
                DEFAULT_TOPIC.to_string()
            } else {
                parsed.topic
            },
            analysis: parsed.analysis,
            prompt: parsed.prompt,
            telemetry: Some(telemetry),
        })
    }

    fn refine(&self, request: &RefineRequest) -> Result<Vec<RefinedPrompt>, ProviderError> {
        if request.prompts.is_empty() {
            return Ok(Vec::new());
        }
        let seeds = serde_json::to_string(&request.prompts)
            .map_err(|err| ProviderError::Other(format!("Serialize prompt seeds failed: {err}")))?;
        let payload = json!({
            "contents": [{
                "parts": [
                    { "text": rewrite_instruction(&request.goal) },
                    { "text": seeds },
                ]
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "prompt": { "type": "STRING" },
                        },
                        "required": ["id", "prompt"],
                    },
                },
            },
        });
        let (text, _telemetry) = self.execute(&payload)?;
        serde_json::from_str(text.trim()).map_err(|err| {
            ProviderError::invalid_response(format!(
                "Gemini rewrite was not the expected JSON array: {err}; raw: {text}"
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default, rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[allow(dead_code)]
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Option<Vec<GeminiPart>>,
    #[allow(dead_code)]
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(default, rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(default, rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
    #[serde(default, rename = "totalTokenCount")]
    total_token_count: Option<u32>,
}
