use crate::models::{
    AnalysisRequest, ProviderKind, RefineRequest, RefinedPrompt, ShotAnalysis,
};
use crate::providers::ProviderError;

/// The generation-service boundary: fallible, latent, and sequential from
/// the caller's point of view. Implementations must be shareable across
/// threads; the orchestrator holds one for the lifetime of a batch.
pub trait ShotAnalyst: Send + Sync {
    fn provider_kind(&self) -> ProviderKind;
    fn model_name(&self) -> &str;

    /// Synthesizes topic/analysis/prompt for one start/end pair.
    fn analyze(&self, request: &AnalysisRequest) -> Result<ShotAnalysis, ProviderError>;

    /// Rewrites existing action prompts in bulk, matched back by shot id.
    /// Ids the provider does not return are left untouched by callers.
    fn refine(&self, request: &RefineRequest) -> Result<Vec<RefinedPrompt>, ProviderError>;
}
