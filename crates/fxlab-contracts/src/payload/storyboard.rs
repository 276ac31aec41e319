use serde_json::{json, Map, Value};

use crate::session::SessionId;

use super::reference::{ReferenceEntry, ReferenceSet};

/// Value the service uses to mark an optional storyboard field as deliberately absent.
pub const MISSING_SENTINEL: &str = "undefined";

/// Which reference roles were supplied to one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Presence {
    pub subject: bool,
    pub scene: bool,
    pub style: bool,
}

impl Presence {
    pub const fn new(subject: bool, scene: bool, style: bool) -> Self {
        Self {
            subject,
            scene,
            style,
        }
    }

    pub fn is_empty(self) -> bool {
        !(self.subject || self.scene || self.style)
    }
}

// One row per presence combination. The all-absent row sends no `values` at all.
const MISSING_FIELDS: [(Presence, &[&str]); 8] = [
    (Presence::new(true, true, true), &["pose"]),
    (Presence::new(true, true, false), &["style", "pose"]),
    (Presence::new(true, false, true), &["location", "pose"]),
    (Presence::new(false, true, true), &["pose"]),
    (Presence::new(true, false, false), &["location", "style", "pose"]),
    (Presence::new(false, true, false), &["style", "pose"]),
    (Presence::new(false, false, true), &["location", "pose"]),
    (Presence::new(false, false, false), &[]),
];

/// Fields listed under `meta.values` for a presence combination, in wire order.
pub fn missing_fields(presence: Presence) -> &'static [&'static str] {
    MISSING_FIELDS
        .iter()
        .find(|(row, _)| *row == presence)
        .map(|(_, fields)| *fields)
        .unwrap_or(&[])
}

/// Builds the storyboard-prompt request. Reference entries must already carry
/// their derived captions in `prompt`.
pub fn storyboard_payload(
    references: &ReferenceSet<ReferenceEntry>,
    additional_input: &str,
    session: &SessionId,
    num_images: u32,
) -> Value {
    let characters: Vec<&ReferenceEntry> = references.subject.iter().collect();

    let mut meta = Map::new();
    let missing = missing_fields(references.presence());
    if !missing.is_empty() {
        let values: Map<String, Value> = missing
            .iter()
            .map(|field| (field.to_string(), json!([MISSING_SENTINEL])))
            .collect();
        meta.insert("values".to_string(), Value::Object(values));
    }

    json!({
        "json": {
            "characters": characters,
            "location": references.scene,
            "style": references.style,
            "pose": null,
            "additionalInput": additional_input,
            "sessionId": session,
            "numImages": num_images,
        },
        "meta": meta,
    })
}
