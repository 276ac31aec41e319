use anyhow::Result;
use fxlab_contracts::nodes::{
    input_spec, InputSpec, Node, NodeInputs, NodeValue, OutputKind, OutputSpec,
};

use super::prompt_kind;
use crate::assembler::split_prompts;

pub const WHISK_PROMPTS_NODE: &str = "ComfyUI-Whisk-Prompts";

/// Splits the reference-image node's `prompts` output into four strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhiskPromptsNode;

impl Node for WhiskPromptsNode {
    fn name(&self) -> &str {
        WHISK_PROMPTS_NODE
    }

    fn display_name(&self) -> &str {
        "ComfyUI-Whisk-Prompts🌪️"
    }

    fn inputs(&self) -> Vec<InputSpec> {
        vec![InputSpec::required("prompts", prompt_kind())]
    }

    fn outputs(&self) -> Vec<OutputSpec> {
        vec![
            OutputSpec::new("prompt1", OutputKind::String),
            OutputSpec::new("prompt2", OutputKind::String),
            OutputSpec::new("prompt3", OutputKind::String),
            OutputSpec::new("prompt4", OutputKind::String),
        ]
    }

    fn execute(&self, inputs: &NodeInputs) -> Result<Vec<NodeValue>> {
        let specs = self.inputs();
        let raw = inputs.string(input_spec(&specs, "prompts")?)?;
        Ok(split_prompts(&raw)?
            .into_iter()
            .map(NodeValue::String)
            .collect())
    }
}
