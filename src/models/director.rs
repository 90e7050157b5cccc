use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::image::image_dimensions;

/// Target emotion for the emotion director tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Scared,
    Surprised,
    Tired,
    Excited,
    Nervous,
    Thinking,
    Confused,
    Shy,
    Disgusted,
    Smug,
    Bored,
    Laughing,
    Irritated,
    Aroused,
    Embarrassed,
    Worried,
    Love,
    Determined,
    Hurt,
    Playful,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Scared => "scared",
            Emotion::Surprised => "surprised",
            Emotion::Tired => "tired",
            Emotion::Excited => "excited",
            Emotion::Nervous => "nervous",
            Emotion::Thinking => "thinking",
            Emotion::Confused => "confused",
            Emotion::Shy => "shy",
            Emotion::Disgusted => "disgusted",
            Emotion::Smug => "smug",
            Emotion::Bored => "bored",
            Emotion::Laughing => "laughing",
            Emotion::Irritated => "irritated",
            Emotion::Aroused => "aroused",
            Emotion::Embarrassed => "embarrassed",
            Emotion::Worried => "worried",
            Emotion::Love => "love",
            Emotion::Determined => "determined",
            Emotion::Hurt => "hurt",
            Emotion::Playful => "playful",
        }
    }
}

/// Strength of the emotion change. Maps onto the tool's `defry` knob, where
/// higher values weaken the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmotionLevel {
    #[default]
    Normal,
    SlightlyWeak,
    Weak,
    EvenWeaker,
    VeryWeak,
    Weakest,
}

impl EmotionLevel {
    pub fn defry(&self) -> i64 {
        match self {
            EmotionLevel::Normal => 0,
            EmotionLevel::SlightlyWeak => 1,
            EmotionLevel::Weak => 2,
            EmotionLevel::EvenWeaker => 3,
            EmotionLevel::VeryWeak => 4,
            EmotionLevel::Weakest => 5,
        }
    }
}

/// One of the service's single-image editing tools. Each variant carries
/// exactly the inputs its tool consumes; the plain tools take none.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectorTool {
    LineArt,
    Sketch,
    BackgroundRemoval,
    Declutter,
    Colorize {
        prompt: String,
        defry: i64,
    },
    Emotion {
        emotion: Emotion,
        prompt: String,
        level: EmotionLevel,
    },
}

impl DirectorTool {
    pub fn req_type(&self) -> &'static str {
        match self {
            DirectorTool::LineArt => "lineart",
            DirectorTool::Sketch => "sketch",
            DirectorTool::BackgroundRemoval => "bg-removal",
            DirectorTool::Declutter => "declutter",
            DirectorTool::Colorize { .. } => "colorize",
            DirectorTool::Emotion { .. } => "emotion",
        }
    }

    /// The prompt the wire wants. Emotion prompts use the
    /// `"{target};;{extra},"` convention the service expects.
    pub fn prompt(&self) -> String {
        match self {
            DirectorTool::Colorize { prompt, .. } => prompt.clone(),
            DirectorTool::Emotion {
                emotion, prompt, ..
            } => {
                let mut out = format!("{};;", emotion.as_str());
                if !prompt.is_empty() {
                    out.push_str(prompt);
                    out.push(',');
                }
                out
            }
            _ => String::new(),
        }
    }

    pub fn defry(&self) -> i64 {
        match self {
            DirectorTool::Colorize { defry, .. } => *defry,
            DirectorTool::Emotion { level, .. } => level.defry(),
            _ => 0,
        }
    }
}

/// A director tool invocation over one image.
#[derive(Debug, Clone)]
pub struct DirectorRequest {
    pub tool: DirectorTool,
    pub width: u32,
    pub height: u32,
    /// Base64-encoded source image.
    pub image: String,
}

impl DirectorRequest {
    /// Builds a request from raw image bytes, sniffing the dimensions from
    /// the PNG or JPEG header.
    pub fn from_image_bytes(tool: DirectorTool, data: &[u8]) -> Result<Self> {
        let (width, height) = image_dimensions(data)?;
        Ok(DirectorRequest {
            tool,
            width,
            height,
            image: BASE64.encode(data),
        })
    }

    pub fn to_payload(&self) -> Value {
        json!({
            "req_type": self.tool.req_type(),
            "width": self.width,
            "height": self.height,
            "image": self.image,
            "prompt": self.tool.prompt(),
            "defry": self.tool.defry(),
        })
    }
}
