//! Request bodies and response shapes for the caption, storyboard and
//! image-generation endpoints.

mod generation;
mod reference;
mod response;
mod storyboard;

pub use generation::{GenerationRequest, Tool, MAX_CANDIDATES, MODEL_NAME_TYPE};
pub use reference::{caption_payload, ReferenceEntry, ReferenceRole, ReferenceSet};
pub use response::{trpc_json_string, GeneratedCandidate, GeneratedImage, GenerationResponse, ImagePanel};
pub use storyboard::{missing_fields, storyboard_payload, Presence, MISSING_SENTINEL};
