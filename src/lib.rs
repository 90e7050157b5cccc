//! Async client for the NovelAI image-generation API.
//!
//! The crate's core is the parameter-normalization pipeline
//! ([`GenerationRequest::normalize`]) and the streaming event decoder
//! ([`StreamEventParser`], [`parse_event_stream`]); [`NaiClient`] wires both
//! to the HTTP endpoints, including director tools and vibe transfer.

pub mod archive;
pub mod client;
pub mod config;
pub mod constant;
pub mod cost;
pub mod error;
pub mod logger;
pub mod models;
pub mod normalize;
pub mod stream;
pub mod tags;

pub use client::{AccessTokenProvider, NaiClient, StaticToken};
pub use config::ClientConfig;
pub use constant::{
    Action, ControlnetModel, Endpoint, Model, ModelFamily, NoiseSchedule, Resolution, Sampler,
};
pub use cost::estimate_anlas;
pub use error::{Error, Result};
pub use models::{
    CaptionFormat, CharacterCaption, CharacterPrompt, DirectorRequest, DirectorTool, Emotion,
    EmotionLevel, Image, ImageFormat, NegativePromptFormat, Position, PromptFormat, StreamEvent,
};
pub use models::request::GenerationRequest;
pub use normalize::NormalizedRequest;
pub use stream::{decode_frame, final_images, parse_event_stream, StreamEventParser};
pub use tags::deduplicate_tags;
