use serde::{Deserialize, Serialize};

/// Center position for character placement, both axes in [0.1, 0.9].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const CENTER: Position = Position { x: 0.5, y: 0.5 };

    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::CENTER
    }
}

/// One character slot in a multi-character request. Order in the request
/// list is significant and carries through to the synthesized captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterPrompt {
    pub prompt: String,
    #[serde(default = "default_character_uc")]
    pub uc: String,
    #[serde(default)]
    pub center: Position,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl CharacterPrompt {
    pub fn new(prompt: impl Into<String>) -> Self {
        CharacterPrompt {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn at(prompt: impl Into<String>, x: f64, y: f64) -> Self {
        CharacterPrompt {
            prompt: prompt.into(),
            center: Position::new(x, y),
            ..Default::default()
        }
    }
}

impl Default for CharacterPrompt {
    fn default() -> Self {
        CharacterPrompt {
            prompt: String::new(),
            uc: default_character_uc(),
            center: Position::CENTER,
            enabled: true,
        }
    }
}

fn default_character_uc() -> String {
    "lowres, aliasing".to_string()
}

fn default_true() -> bool {
    true
}

/// Per-character caption entry inside the structured prompt format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCaption {
    pub char_caption: String,
    pub centers: Vec<Position>,
}

/// Structured caption block shared by the positive and negative formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionFormat {
    pub base_caption: String,
    #[serde(default)]
    pub char_captions: Vec<CharacterCaption>,
}

/// `parameters.v4_prompt` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFormat {
    pub caption: CaptionFormat,
    #[serde(default)]
    pub use_coords: bool,
    #[serde(default = "default_true")]
    pub use_order: bool,
}

/// `parameters.v4_negative_prompt` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativePromptFormat {
    pub caption: CaptionFormat,
    #[serde(default)]
    pub legacy_uc: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_prompt_defaults() {
        let cp = CharacterPrompt::new("1girl, silver hair");
        assert_eq!(cp.uc, "lowres, aliasing");
        assert_eq!(cp.center, Position::CENTER);
        assert!(cp.enabled);
    }

    #[test]
    fn caption_wire_shape() {
        let prompt = PromptFormat {
            caption: CaptionFormat {
                base_caption: "scenery".to_string(),
                char_captions: vec![CharacterCaption {
                    char_caption: "1girl".to_string(),
                    centers: vec![Position::new(0.3, 0.7)],
                }],
            },
            use_coords: true,
            use_order: true,
        };
        let value = serde_json::to_value(&prompt).unwrap();
        assert_eq!(value["caption"]["base_caption"], "scenery");
        assert_eq!(value["caption"]["char_captions"][0]["char_caption"], "1girl");
        assert_eq!(value["caption"]["char_captions"][0]["centers"][0]["x"], 0.3);
        assert_eq!(value["use_coords"], true);
    }
}
