use serde::{Deserialize, Serialize};
use std::time::Duration;
use storyboard::{ImageRef, ShotId};

/// One start/end pair plus the project-wide style directive, ready for the
/// analyst.
#[derive(Clone, Debug)]
pub struct AnalysisRequest {
    pub source: ImageRef,
    pub target: ImageRef,
    pub style_directive: String,
}

/// What the analyst produced for one pair: a short label, descriptive
/// prose, and the production instruction.
#[derive(Clone, Debug, Default)]
pub struct ShotAnalysis {
    pub topic: String,
    pub analysis: String,
    pub prompt: String,
    pub telemetry: Option<ResponseTelemetry>,
}

#[derive(Clone, Debug, Default)]
pub struct ResponseTelemetry {
    pub provider: String,
    pub model: String,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
    pub latency: Option<Duration>,
}

/// A whole-sequence prompt rewrite pass.
#[derive(Clone, Debug)]
pub struct RefineRequest {
    pub goal: RewriteGoal,
    pub prompts: Vec<PromptSeed>,
}

#[derive(Clone, Debug)]
pub enum RewriteGoal {
    /// Lock every action prompt to one aesthetic directive.
    Aesthetic { directive: String },
    /// Scrub copyrighted terms and condense prompts into the dense token
    /// form the render engine prioritizes.
    EngineOptimize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PromptSeed {
    pub id: ShotId,
    pub topic: String,
    pub prompt: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RefinedPrompt {
    pub id: ShotId,
    pub prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
    Custom(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Mock => "mock",
            ProviderKind::Custom(name) => name.as_str(),
        }
    }
}
