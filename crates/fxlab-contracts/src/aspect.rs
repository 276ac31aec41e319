use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    Square,
    Portrait,
    #[default]
    Landscape,
    PortraitThreeFour,
    LandscapeFourThree,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::PortraitThreeFour,
        AspectRatio::LandscapeFourThree,
    ];

    /// Label shown in the node's choice input.
    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1 (Square)",
            AspectRatio::Portrait => "9:16 (Portrait)",
            AspectRatio::Landscape => "16:9 (Landscape)",
            AspectRatio::PortraitThreeFour => "3:4 (Portrait)",
            AspectRatio::LandscapeFourThree => "4:3 (Landscape)",
        }
    }

    pub fn api_value(self) -> &'static str {
        match self {
            AspectRatio::Square => "IMAGE_ASPECT_RATIO_SQUARE",
            AspectRatio::Portrait => "IMAGE_ASPECT_RATIO_PORTRAIT",
            AspectRatio::Landscape => "IMAGE_ASPECT_RATIO_LANDSCAPE",
            AspectRatio::PortraitThreeFour => "IMAGE_ASPECT_RATIO_PORTRAIT_THREE_FOUR",
            AspectRatio::LandscapeFourThree => "IMAGE_ASPECT_RATIO_LANDSCAPE_FOUR_THREE",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.label() == trimmed)
    }

    /// Unknown labels map to landscape, matching the service default.
    pub fn from_label_or_default(label: &str) -> Self {
        Self::from_label(label).unwrap_or_else(|| {
            log::warn!("unknown aspect ratio '{label}'; using {}", Self::default().label());
            Self::default()
        })
    }

    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(|ratio| ratio.label()).collect()
    }
}

impl Serialize for AspectRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.api_value())
    }
}

#[cfg(test)]
mod tests {
    use super::AspectRatio;

    #[test]
    fn labels_map_to_api_values() {
        assert_eq!(
            AspectRatio::from_label("1:1 (Square)").map(AspectRatio::api_value),
            Some("IMAGE_ASPECT_RATIO_SQUARE")
        );
        assert_eq!(
            AspectRatio::from_label("4:3 (Landscape)").map(AspectRatio::api_value),
            Some("IMAGE_ASPECT_RATIO_LANDSCAPE_FOUR_THREE")
        );
        assert_eq!(
            AspectRatio::from_label(" 3:4 (Portrait) ").map(AspectRatio::api_value),
            Some("IMAGE_ASPECT_RATIO_PORTRAIT_THREE_FOUR")
        );
    }

    #[test]
    fn unknown_label_falls_back_to_landscape() {
        assert_eq!(AspectRatio::from_label("2:1"), None);
        assert_eq!(
            AspectRatio::from_label_or_default("2:1"),
            AspectRatio::Landscape
        );
    }

    #[test]
    fn serializes_as_api_value() -> anyhow::Result<()> {
        let value = serde_json::to_value(AspectRatio::Portrait)?;
        assert_eq!(value, serde_json::json!("IMAGE_ASPECT_RATIO_PORTRAIT"));
        Ok(())
    }

    #[test]
    fn labels_keep_declaration_order() {
        assert_eq!(
            AspectRatio::labels(),
            vec![
                "1:1 (Square)",
                "9:16 (Portrait)",
                "16:9 (Landscape)",
                "3:4 (Portrait)",
                "4:3 (Landscape)",
            ]
        );
    }
}
