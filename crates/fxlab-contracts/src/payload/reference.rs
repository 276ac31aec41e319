use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::session::SessionId;

use super::storyboard::Presence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReferenceRole {
    Subject,
    Scene,
    Style,
}

impl ReferenceRole {
    pub const ALL: [ReferenceRole; 3] = [
        ReferenceRole::Subject,
        ReferenceRole::Scene,
        ReferenceRole::Style,
    ];

    /// Caption category understood by the remote service.
    pub fn category(self) -> &'static str {
        match self {
            ReferenceRole::Subject => "CHARACTER",
            ReferenceRole::Scene => "LOCATION",
            ReferenceRole::Style => "STYLE",
        }
    }

    pub fn index(self) -> u8 {
        match self {
            ReferenceRole::Subject => 0,
            ReferenceRole::Scene => 1,
            ReferenceRole::Style => 2,
        }
    }

    pub fn input_name(self) -> &'static str {
        match self {
            ReferenceRole::Subject => "subject_image",
            ReferenceRole::Scene => "scene_image",
            ReferenceRole::Style => "style_image",
        }
    }
}

/// One uploaded reference image as the storyboard endpoint expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    #[serde(skip)]
    pub role: ReferenceRole,
    pub image_id: String,
    pub category: &'static str,
    pub is_placeholder: bool,
    pub base64_image: String,
    pub index: u8,
    pub is_uploading: bool,
    pub is_loading: bool,
    pub is_selected: bool,
    pub prompt: String,
}

impl ReferenceEntry {
    pub fn new(role: ReferenceRole, base64_image: impl Into<String>) -> Self {
        Self {
            role,
            image_id: format!("image-{}", Uuid::new_v4()),
            category: role.category(),
            is_placeholder: false,
            base64_image: base64_image.into(),
            index: role.index(),
            is_uploading: false,
            is_loading: false,
            is_selected: true,
            prompt: String::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }
}

/// Zero to three values keyed by reference role.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet<T> {
    pub subject: Option<T>,
    pub scene: Option<T>,
    pub style: Option<T>,
}

impl<T> Default for ReferenceSet<T> {
    fn default() -> Self {
        Self {
            subject: None,
            scene: None,
            style: None,
        }
    }
}

impl<T> ReferenceSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: ReferenceRole) -> Option<&T> {
        match role {
            ReferenceRole::Subject => self.subject.as_ref(),
            ReferenceRole::Scene => self.scene.as_ref(),
            ReferenceRole::Style => self.style.as_ref(),
        }
    }

    pub fn set(&mut self, role: ReferenceRole, value: Option<T>) {
        match role {
            ReferenceRole::Subject => self.subject = value,
            ReferenceRole::Scene => self.scene = value,
            ReferenceRole::Style => self.style = value,
        }
    }

    pub fn with(mut self, role: ReferenceRole, value: T) -> Self {
        self.set(role, Some(value));
        self
    }

    pub fn presence(&self) -> Presence {
        Presence {
            subject: self.subject.is_some(),
            scene: self.scene.is_some(),
            style: self.style.is_some(),
        }
    }

    /// Present values in role order (subject, scene, style).
    pub fn iter(&self) -> impl Iterator<Item = (ReferenceRole, &T)> {
        ReferenceRole::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|value| (role, value)))
    }
}

pub fn caption_payload(role: ReferenceRole, image_base64: &str, session: &SessionId) -> Value {
    json!({
        "json": {
            "category": role.category(),
            "imageBase64": image_base64,
            "sessionId": session,
        }
    })
}
