use serde_json::{json, Value};

use crate::aspect::AspectRatio;
use crate::session::SessionId;

pub const MODEL_NAME_TYPE: &str = "IMAGEN_3_1";
pub const MAX_CANDIDATES: u32 = 4;

/// Client tool the generation call is attributed to. Each tool has its own
/// accepted seed range and referer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    ImageFx,
    Backbone,
}

impl Tool {
    pub fn api_value(self) -> &'static str {
        match self {
            Tool::ImageFx => "IMAGE_FX",
            Tool::Backbone => "BACKBONE",
        }
    }

    pub fn seed_modulus(self) -> i64 {
        match self {
            Tool::ImageFx => 1_000_000,
            Tool::Backbone => 2_147_483_647,
        }
    }

    pub fn referer(self) -> &'static str {
        match self {
            Tool::ImageFx => "https://labs.google/",
            Tool::Backbone => "https://labs.google/fx/zh/tools/whisk",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub tool: Tool,
    pub prompt: String,
    pub candidate_count: u32,
    pub seed: i64,
    pub aspect_ratio: AspectRatio,
    pub session_id: SessionId,
    pub model_name_type: &'static str,
}

impl GenerationRequest {
    pub fn new(
        tool: Tool,
        prompt: impl Into<String>,
        candidate_count: u32,
        seed: i64,
        aspect_ratio: AspectRatio,
        session_id: SessionId,
    ) -> Self {
        Self {
            tool,
            prompt: prompt.into(),
            candidate_count: candidate_count.clamp(1, MAX_CANDIDATES),
            seed,
            aspect_ratio,
            session_id,
            model_name_type: MODEL_NAME_TYPE,
        }
    }

    /// Seed as transmitted: reduced into the tool's accepted range.
    pub fn wire_seed(&self) -> i64 {
        self.seed.rem_euclid(self.tool.seed_modulus())
    }

    pub fn to_payload(&self) -> Value {
        json!({
            "userInput": {
                "candidatesCount": self.candidate_count,
                "prompts": [self.prompt],
                "isExpandedPrompt": false,
                "seed": self.wire_seed(),
            },
            "clientContext": {
                "sessionId": self.session_id,
                "tool": self.tool.api_value(),
            },
            "aspectRatio": self.aspect_ratio,
            "modelInput": {
                "modelNameType": self.model_name_type,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{GenerationRequest, Tool};
    use crate::aspect::AspectRatio;
    use crate::session::SessionId;

    #[test]
    fn payload_matches_generation_endpoint_shape() {
        let request = GenerationRequest::new(
            Tool::ImageFx,
            "a red bicycle",
            2,
            42,
            AspectRatio::Square,
            SessionId::from_millis(1000),
        );
        assert_eq!(
            request.to_payload(),
            json!({
                "userInput": {
                    "candidatesCount": 2,
                    "prompts": ["a red bicycle"],
                    "isExpandedPrompt": false,
                    "seed": 42,
                },
                "clientContext": {
                    "sessionId": ";1000",
                    "tool": "IMAGE_FX",
                },
                "aspectRatio": "IMAGE_ASPECT_RATIO_SQUARE",
                "modelInput": {
                    "modelNameType": "IMAGEN_3_1",
                },
            })
        );
    }

    #[test]
    fn seed_is_reduced_per_tool() {
        let session = SessionId::from_millis(1);
        let fx = GenerationRequest::new(
            Tool::ImageFx,
            "p",
            1,
            1_000_042,
            AspectRatio::Landscape,
            session.clone(),
        );
        assert_eq!(fx.wire_seed(), 42);

        let backbone = GenerationRequest::new(
            Tool::Backbone,
            "p",
            1,
            2_147_483_649,
            AspectRatio::Landscape,
            session,
        );
        assert_eq!(backbone.wire_seed(), 2);
        assert_eq!(backbone.to_payload()["clientContext"]["tool"], "BACKBONE");
    }

    #[test]
    fn negative_seed_wraps_into_range() {
        let request = GenerationRequest::new(
            Tool::ImageFx,
            "p",
            1,
            -1,
            AspectRatio::Landscape,
            SessionId::from_millis(1),
        );
        assert_eq!(request.wire_seed(), 999_999);
    }

    #[test]
    fn candidate_count_is_clamped() {
        let session = SessionId::from_millis(1);
        let low = GenerationRequest::new(Tool::ImageFx, "p", 0, 0, AspectRatio::Square, session.clone());
        let high = GenerationRequest::new(Tool::ImageFx, "p", 9, 0, AspectRatio::Square, session);
        assert_eq!(low.candidate_count, 1);
        assert_eq!(high.candidate_count, 4);
    }
}
