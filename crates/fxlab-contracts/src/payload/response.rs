use serde::Deserialize;
use serde_json::Value;

/// Extracts `result.data.json` from a caption or storyboard response when it is a string.
pub fn trpc_json_string(body: &Value) -> Option<String> {
    body.pointer("/result/data/json")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub image_panels: Vec<ImagePanel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePanel {
    #[serde(default)]
    pub generated_images: Vec<GeneratedImage>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    #[serde(default)]
    pub encoded_image: Option<String>,
    #[serde(default)]
    pub seed: Option<Value>,
}

/// One returned candidate, flattened out of its panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCandidate {
    pub encoded_image: String,
    pub prompt: Option<String>,
    pub seed: Option<String>,
}

impl GenerationResponse {
    /// Candidates of the first panel, in order. Entries without image data are dropped.
    pub fn into_candidates(self) -> Vec<GeneratedCandidate> {
        let Some(panel) = self.image_panels.into_iter().next() else {
            return Vec::new();
        };
        let prompt = panel.prompt.filter(|text| !text.is_empty());
        panel
            .generated_images
            .into_iter()
            .enumerate()
            .filter_map(|(idx, image)| {
                let Some(encoded_image) = image.encoded_image.filter(|data| !data.is_empty())
                else {
                    log::warn!("generated image {idx} has no encodedImage; skipping");
                    return None;
                };
                Some(GeneratedCandidate {
                    encoded_image,
                    prompt: prompt.clone(),
                    seed: image.seed.as_ref().and_then(seed_text),
                })
            })
            .collect()
    }
}

fn seed_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(number) => Some(number.to_string()),
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}
