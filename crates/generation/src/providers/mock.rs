use std::collections::VecDeque;
use std::sync::Mutex;

use super::ProviderError;
use crate::models::{
    AnalysisRequest, ProviderKind, RefineRequest, RefinedPrompt, RewriteGoal, ShotAnalysis,
};
use crate::service::ShotAnalyst;

/// Scripted outcome for one analyze call.
#[derive(Clone, Debug)]
pub enum MockOutcome {
    Analysis(ShotAnalysis),
    Failure(String),
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Consumed front to back; once exhausted, every call succeeds with a
    /// deterministic stub derived from the style directive.
    pub scripted: Vec<MockOutcome>,
}

pub struct MockAnalyst {
    queue: Mutex<VecDeque<MockOutcome>>,
}

impl MockAnalyst {
    pub fn new(config: MockConfig) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from(config.scripted)),
        }
    }

    fn next_outcome(&self) -> Option<MockOutcome> {
        self.queue.lock().expect("mock queue poisoned").pop_front()
    }
}

impl ShotAnalyst for MockAnalyst {
    fn provider_kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }

    fn model_name(&self) -> &str {
        "continuity-mock-analyst"
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<ShotAnalysis, ProviderError> {
        match self.next_outcome() {
            Some(MockOutcome::Analysis(analysis)) => Ok(analysis),
            Some(MockOutcome::Failure(message)) => Err(ProviderError::Other(message)),
            None => Ok(ShotAnalysis {
                topic: "Sequence Segment".to_string(),
                analysis: format!(
                    "Two reference frames bridged under the directive '{}'.",
                    request.style_directive.trim()
                ),
                prompt: "A smooth, continuous motion from the first frame into the second."
                    .to_string(),
                telemetry: None,
            }),
        }
    }

    fn refine(&self, request: &RefineRequest) -> Result<Vec<RefinedPrompt>, ProviderError> {
        let label = match &request.goal {
            RewriteGoal::Aesthetic { directive } => format!("Refined ({}):", directive.trim()),
            RewriteGoal::EngineOptimize => "Optimized:".to_string(),
        };
        Ok(request
            .prompts
            .iter()
            .map(|seed| RefinedPrompt {
                id: seed.id,
                prompt: format!("{} {}", label, seed.prompt),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyboard::{ImageRef, ShotId};

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            source: ImageRef::from_bytes("image/png", b"a"),
            target: ImageRef::from_bytes("image/png", b"b"),
            style_directive: "storyboard sketch".to_string(),
        }
    }

    #[test]
    fn scripted_outcomes_are_consumed_in_order() {
        let analyst = MockAnalyst::new(MockConfig {
            scripted: vec![
                MockOutcome::Analysis(ShotAnalysis {
                    topic: "first".into(),
                    ..ShotAnalysis::default()
                }),
                MockOutcome::Failure("service unavailable".into()),
            ],
        });
        assert_eq!(analyst.analyze(&request()).unwrap().topic, "first");
        let err = analyst.analyze(&request()).unwrap_err();
        assert_eq!(err.to_string(), "service unavailable");
        // Exhausted scripts fall back to the deterministic stub.
        assert_eq!(analyst.analyze(&request()).unwrap().topic, "Sequence Segment");
    }

    #[test]
    fn refine_tags_every_prompt_by_id() {
        let analyst = MockAnalyst::new(MockConfig::default());
        let id = ShotId::new();
        let refined = analyst
            .refine(&RefineRequest {
                goal: RewriteGoal::EngineOptimize,
                prompts: vec![crate::models::PromptSeed {
                    id,
                    topic: "beat".to_string(),
                    prompt: "walk through the rain".to_string(),
                }],
            })
            .unwrap();
        assert_eq!(refined.len(), 1);
        assert_eq!(refined[0].id, id);
        assert_eq!(refined[0].prompt, "Optimized: walk through the rain");
    }
}
