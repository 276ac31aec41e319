use anyhow::Result;
use fxlab_contracts::events::EventLog;
use fxlab_contracts::nodes::{
    input_spec, InputKind, InputSpec, Node, NodeInputs, NodeValue, OutputKind, OutputSpec,
};
use fxlab_contracts::payload::{
    storyboard_payload, GenerationRequest, ReferenceEntry, ReferenceRole, ReferenceSet, Tool,
    MAX_CANDIDATES,
};
use fxlab_contracts::{AspectRatio, ImageTensor, SessionId};

use super::{aspect_ratio_kind, image_count, prompt_kind};
use crate::assembler::{
    assemble_generation, caption_or_fallback, storyboard_or_fallback, Fallback, GenerationResult,
};
use crate::client::RemoteClient;
use crate::codec::encode_for_upload;
use crate::progress::Reporter;

pub const WHISK_NODE: &str = "ComfyUI-Whisk";
const DEFAULT_WHISK_IMAGES: i64 = 2;

/// Everything the reference-image node hands back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct WhiskOutput {
    pub generation: GenerationResult,
    pub subject_prompt: String,
    pub scene_prompt: String,
    pub style_prompt: String,
}

impl WhiskOutput {
    pub fn caption(&self, role: ReferenceRole) -> &str {
        match role {
            ReferenceRole::Subject => &self.subject_prompt,
            ReferenceRole::Scene => &self.scene_prompt,
            ReferenceRole::Style => &self.style_prompt,
        }
    }

    /// Per-image prompts as a JSON array string, for the prompt-splitting node.
    pub fn prompts_json(&self) -> String {
        self.generation.prompts_json()
    }
}

/// Caption each reference image, synthesize a storyboard prompt from the
/// captions and the user's text, then generate from that prompt.
#[derive(Clone)]
pub struct WhiskNode {
    client: RemoteClient,
    events: EventLog,
}

impl WhiskNode {
    pub fn new(client: RemoteClient, events: EventLog) -> Self {
        Self { client, events }
    }

    pub fn generate(
        &self,
        prompt: &str,
        references: ReferenceSet<&ImageTensor>,
        num_images: u32,
        seed: i64,
        aspect_ratio: AspectRatio,
    ) -> WhiskOutput {
        let session = SessionId::now();
        let reporter = Reporter::new(WHISK_NODE, session.clone(), self.events.clone());
        let num_images = num_images.clamp(1, MAX_CANDIDATES);

        let entries = self.caption_references(&references, &session, &reporter);
        let payload = storyboard_payload(&entries, prompt, &session, num_images);
        reporter.progress(30);

        let storyboard =
            storyboard_or_fallback(self.client.storyboard(&payload), &reporter);
        reporter.progress(50);

        let generation = if storyboard.trim().is_empty() {
            log::warn!("{WHISK_NODE}: empty storyboard prompt; skipping generation");
            Fallback::PlaceholderBatch.record(&reporter, "empty storyboard prompt");
            GenerationResult::placeholder(num_images as usize, seed)
        } else {
            let request = GenerationRequest::new(
                Tool::Backbone,
                storyboard,
                num_images,
                seed,
                aspect_ratio,
                session,
            );
            log::info!(
                "{WHISK_NODE}: requesting {} image(s), seed {}",
                request.candidate_count,
                request.wire_seed()
            );
            let outcome = self.client.generate(&request);
            assemble_generation(outcome, request.candidate_count as usize, seed, &reporter)
        };
        reporter.progress(100);

        let caption = |role| {
            entries
                .get(role)
                .map(|entry| entry.prompt.clone())
                .unwrap_or_default()
        };
        WhiskOutput {
            subject_prompt: caption(ReferenceRole::Subject),
            scene_prompt: caption(ReferenceRole::Scene),
            style_prompt: caption(ReferenceRole::Style),
            generation,
        }
    }

    /// Builds one entry per supplied image, captions attached. An image that
    /// cannot be encoded is dropped, so it is reported missing downstream.
    fn caption_references(
        &self,
        references: &ReferenceSet<&ImageTensor>,
        session: &SessionId,
        reporter: &Reporter,
    ) -> ReferenceSet<ReferenceEntry> {
        let mut entries = ReferenceSet::new();
        for (role, tensor) in references.iter() {
            let encoded = match encode_for_upload(tensor) {
                Ok(encoded) => encoded,
                Err(err) => {
                    log::error!("failed to encode {} reference image: {err:#}", role.category());
                    continue;
                }
            };
            let caption = caption_or_fallback(
                role,
                self.client.caption(role, &encoded, session),
                reporter,
            );
            entries.set(role, Some(ReferenceEntry::new(role, encoded).with_prompt(caption)));
        }
        entries
    }
}

impl Node for WhiskNode {
    fn name(&self) -> &str {
        WHISK_NODE
    }

    fn display_name(&self) -> &str {
        "ComfyUI-Whisk🌪️"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("prompt", prompt_kind()),
            InputSpec::required(
                "num_images",
                InputKind::Int {
                    default: DEFAULT_WHISK_IMAGES,
                    min: 1,
                    max: i64::from(MAX_CANDIDATES),
                },
            ),
            InputSpec::required(
                "seed",
                InputKind::Int {
                    default: 0,
                    min: 0,
                    max: Tool::Backbone.seed_modulus(),
                },
            ),
            InputSpec::optional(ReferenceRole::Subject.input_name(), InputKind::Image),
            InputSpec::optional(ReferenceRole::Scene.input_name(), InputKind::Image),
            InputSpec::optional(ReferenceRole::Style.input_name(), InputKind::Image),
            InputSpec::optional("aspect_ratio", aspect_ratio_kind()),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![
            OutputSpec::new("generated_images", OutputKind::Image),
            OutputSpec::new("subject_prompt", OutputKind::String),
            OutputSpec::new("scene_prompt", OutputKind::String),
            OutputSpec::new("style_prompt", OutputKind::String),
            OutputSpec::new("prompts", OutputKind::String),
        ]
    }

    fn execute(&self, inputs: &NodeInputs) -> Result<Vec<NodeValue>> {
        let specs = self.inputs();
        let prompt = inputs.string(input_spec(&specs, "prompt")?)?;
        let num_images = image_count(inputs.int(input_spec(&specs, "num_images")?)?);
        let seed = inputs.int_unclamped(input_spec(&specs, "seed")?)?;
        let aspect_ratio =
            AspectRatio::from_label_or_default(&inputs.choice(input_spec(&specs, "aspect_ratio")?)?);

        let mut references = ReferenceSet::new();
        for role in ReferenceRole::ALL {
            references.set(role, inputs.image(input_spec(&specs, role.input_name())?)?);
        }

        let output = self.generate(&prompt, references, num_images, seed, aspect_ratio);
        let prompts = output.prompts_json();
        Ok(vec![
            NodeValue::Image(output.generation.images),
            NodeValue::String(output.subject_prompt),
            NodeValue::String(output.scene_prompt),
            NodeValue::String(output.style_prompt),
            NodeValue::String(prompts),
        ])
    }
}
