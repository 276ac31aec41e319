use anyhow::Result;
use fxlab_contracts::events::EventLog;
use fxlab_contracts::nodes::{
    input_spec, InputKind, InputSpec, Node, NodeInputs, NodeValue, OutputKind, OutputSpec,
};
use fxlab_contracts::payload::{GenerationRequest, Tool, MAX_CANDIDATES};
use fxlab_contracts::{AspectRatio, SessionId};

use super::{aspect_ratio_kind, image_count, prompt_kind};
use crate::assembler::{assemble_generation, GenerationResult};
use crate::client::RemoteClient;
use crate::progress::Reporter;

pub const IMAGEFX_NODE: &str = "ComfyUI-ImageFx";

/// Single-prompt text-to-image generation.
#[derive(Clone)]
pub struct ImageFxNode {
    client: RemoteClient,
    events: EventLog,
}

impl ImageFxNode {
    pub fn new(client: RemoteClient, events: EventLog) -> Self {
        Self { client, events }
    }

    /// Always returns a batch of `num_images` frames; failures degrade to the placeholder.
    pub fn generate(
        &self,
        prompt: &str,
        seed: i64,
        aspect_ratio: AspectRatio,
        num_images: u32,
    ) -> GenerationResult {
        let session = SessionId::now();
        let reporter = Reporter::new(IMAGEFX_NODE, session.clone(), self.events.clone());
        reporter.progress(20);

        let request =
            GenerationRequest::new(Tool::ImageFx, prompt, num_images, seed, aspect_ratio, session);
        log::info!(
            "{IMAGEFX_NODE}: requesting {} image(s), seed {} ({})",
            request.candidate_count,
            request.wire_seed(),
            aspect_ratio.label()
        );
        reporter.progress(50);

        let outcome = self.client.generate(&request);
        let result = assemble_generation(
            outcome,
            request.candidate_count as usize,
            seed,
            &reporter,
        );
        reporter.progress(100);
        result
    }
}

impl Node for ImageFxNode {
    fn name(&self) -> &str {
        IMAGEFX_NODE
    }

    fn display_name(&self) -> &str {
        "ComfyUI-ImageFx🖼️"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::required("prompt", prompt_kind()),
            InputSpec::required(
                "seed",
                InputKind::Int {
                    default: 0,
                    min: 0,
                    max: Tool::ImageFx.seed_modulus() - 1,
                },
            ),
            InputSpec::required("aspect_ratio", aspect_ratio_kind()),
            InputSpec::required(
                "num_images",
                InputKind::Int {
                    default: i64::from(MAX_CANDIDATES),
                    min: 1,
                    max: i64::from(MAX_CANDIDATES),
                },
            ),
        ]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![
            OutputSpec::new("generated_images", OutputKind::Image),
            OutputSpec::new("seed", OutputKind::String),
        ]
    }

    fn execute(&self, inputs: &NodeInputs) -> Result<Vec<NodeValue>> {
        let specs = self.inputs();
        let prompt = inputs.string(input_spec(&specs, "prompt")?)?;
        let seed = inputs.int_unclamped(input_spec(&specs, "seed")?)?;
        let aspect_ratio =
            AspectRatio::from_label_or_default(&inputs.choice(input_spec(&specs, "aspect_ratio")?)?);
        let num_images = image_count(inputs.int(input_spec(&specs, "num_images")?)?);

        let result = self.generate(&prompt, seed, aspect_ratio, num_images);
        Ok(vec![
            NodeValue::Image(result.images),
            NodeValue::String(result.seed),
        ])
    }
}
