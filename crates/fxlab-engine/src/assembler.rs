//! Fallback policy and result assembly. Remote calls report failures as
//! [`FailureKind`]; this module decides what each failure turns into so a node
//! invocation always completes with a well-formed result.

use anyhow::{bail, Context, Result};
use fxlab_contracts::events::NodeEvent;
use fxlab_contracts::payload::{GeneratedCandidate, ReferenceRole};
use fxlab_contracts::ImageTensor;
use serde_json::Value;

use crate::codec::decode_from_response;
use crate::error::FailureKind;
use crate::progress::Reporter;

/// Number of discrete prompt outputs on the prompt-splitting node.
pub const PROMPT_OUTPUTS: usize = 4;

/// Substitute value chosen when a remote call yields nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    EmptyCaption(ReferenceRole),
    EmptyStoryboard,
    PlaceholderBatch,
}

impl Fallback {
    /// Stage label written to `fallback_used` events.
    pub fn stage(self) -> String {
        match self {
            Fallback::EmptyCaption(role) => format!("caption:{}", role.category()),
            Fallback::EmptyStoryboard => "storyboard".to_string(),
            Fallback::PlaceholderBatch => "generation".to_string(),
        }
    }

    pub fn record(self, reporter: &Reporter, reason: impl Into<String>) {
        reporter.record(NodeEvent::FallbackUsed {
            stage: self.stage(),
            reason: reason.into(),
        });
    }
}

/// Images plus the text that travels with them out of a generation node.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub images: ImageTensor,
    pub seed: String,
    pub prompts: Vec<String>,
    pub placeholder: bool,
}

impl GenerationResult {
    /// Zero-filled 512x512 batch sized to the request, echoing the caller's seed.
    pub fn placeholder(requested: usize, input_seed: i64) -> Self {
        Self {
            images: ImageTensor::placeholder(requested.max(1)),
            seed: input_seed.to_string(),
            prompts: Vec::new(),
            placeholder: true,
        }
    }

    pub fn prompts_json(&self) -> String {
        prompts_json(&self.prompts)
    }
}

/// A failed caption becomes an empty string.
pub fn caption_or_fallback(
    role: ReferenceRole,
    outcome: Result<String, FailureKind>,
    reporter: &Reporter,
) -> String {
    match outcome {
        Ok(caption) => {
            reporter.record(NodeEvent::CaptionDerived {
                role: role.category().to_string(),
                chars: caption.chars().count(),
            });
            caption
        }
        Err(err) => {
            log::error!("generateCaption failed for {}: {err}", role.category());
            Fallback::EmptyCaption(role).record(reporter, err.to_string());
            String::new()
        }
    }
}

/// A failed storyboard call becomes an empty prompt.
pub fn storyboard_or_fallback(outcome: Result<String, FailureKind>, reporter: &Reporter) -> String {
    match outcome {
        Ok(prompt) => {
            reporter.record(NodeEvent::StoryboardDerived {
                chars: prompt.chars().count(),
            });
            prompt
        }
        Err(err) => {
            log::error!("generateStoryBoardPrompt failed: {err}");
            Fallback::EmptyStoryboard.record(reporter, err.to_string());
            String::new()
        }
    }
}

/// Decodes candidates into one batch of at most `requested` images.
///
/// Undecodable candidates are skipped. A failed call, a short candidate list or
/// a batch where nothing decodes all yield the placeholder batch instead.
pub fn assemble_generation(
    outcome: Result<Vec<GeneratedCandidate>, FailureKind>,
    requested: usize,
    input_seed: i64,
    reporter: &Reporter,
) -> GenerationResult {
    let requested = requested.max(1);
    let candidates = match outcome {
        Ok(candidates) => candidates,
        Err(err) => {
            log::error!("runImageFx failed: {err}");
            Fallback::PlaceholderBatch.record(reporter, err.to_string());
            return GenerationResult::placeholder(requested, input_seed);
        }
    };

    let total = candidates.len();
    if total < requested {
        log::error!("runImageFx returned {total} images for {requested} requested");
        Fallback::PlaceholderBatch.record(
            reporter,
            format!("{total} of {requested} images returned"),
        );
        return GenerationResult::placeholder(requested, input_seed);
    }
    let mut frames: Vec<ImageTensor> = Vec::new();
    let mut prompts = Vec::new();
    let mut seed = None;
    let mut skipped = 0usize;
    for (idx, candidate) in candidates.into_iter().enumerate() {
        if frames.len() == requested {
            log::warn!(
                "runImageFx returned {total} images for {requested} requested; ignoring the rest"
            );
            break;
        }
        let frame = match decode_from_response(&candidate.encoded_image) {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("failed to decode generated image {idx}: {err}");
                skipped += 1;
                continue;
            }
        };
        if let Some(first) = frames.first() {
            if (first.height(), first.width()) != (frame.height(), frame.width()) {
                log::error!(
                    "generated image {idx} is {}x{}, batch is {}x{}; skipping",
                    frame.width(),
                    frame.height(),
                    first.width(),
                    first.height()
                );
                skipped += 1;
                continue;
            }
        }
        if frames.is_empty() {
            seed = candidate.seed.clone();
        }
        prompts.push(candidate.prompt.unwrap_or_default());
        frames.push(frame);
        reporter.progress(progress_after(frames.len(), requested));
    }

    reporter.record(NodeEvent::ImagesDecoded {
        requested,
        decoded: frames.len(),
        skipped,
    });

    let images = match ImageTensor::concat(&frames) {
        Ok(images) => images,
        Err(err) => {
            log::error!("no usable generated images: {err:#}");
            Fallback::PlaceholderBatch.record(reporter, "no decodable images");
            return GenerationResult::placeholder(requested, input_seed);
        }
    };

    GenerationResult {
        images,
        seed: seed.unwrap_or_else(|| input_seed.to_string()),
        prompts,
        placeholder: false,
    }
}

pub fn prompts_json(prompts: &[String]) -> String {
    serde_json::to_string(prompts).unwrap_or_else(|_| "[]".to_string())
}

/// Splits a JSON array of prompts into exactly four strings: missing slots are
/// empty, extra entries are dropped.
pub fn split_prompts(raw: &str) -> Result<[String; PROMPT_OUTPUTS]> {
    let parsed: Value = serde_json::from_str(raw).context("prompts input is not valid JSON")?;
    let Value::Array(items) = parsed else {
        bail!("prompts input must be a JSON array");
    };
    let mut outputs: [String; PROMPT_OUTPUTS] = Default::default();
    for (slot, item) in outputs.iter_mut().zip(items) {
        *slot = match item {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        };
    }
    Ok(outputs)
}

fn progress_after(decoded: usize, requested: usize) -> u8 {
    let step = 40 * decoded / requested.max(1);
    (50 + step.min(40)) as u8
}
