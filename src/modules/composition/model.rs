use serde::{Deserialize, Serialize};

/// Rendering options carried on the job input.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub aspect_ratio: String,
    pub caption_style: String,
    pub enable_captions: bool,
    pub enable_background_music: bool,
    pub background_music_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPayload {
    pub output: OutputSpec,
    /// Total timeline length in seconds.
    pub duration: f64,
    pub scenes: Vec<SceneTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<MusicTrack>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<CaptionTrack>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub format: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTrack {
    pub index: usize,
    pub start: f64,
    pub length: f64,
    pub visual: VisualClip,
    pub audio: AudioClip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualClip {
    pub src: String,
    pub fit: String,
    pub motion: Motion,
}

/// Camera movement applied to a still over the clip's length. Offsets are
/// fractions of the frame, scale is relative to a cover fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motion {
    pub treatment: String,
    pub scale_from: f64,
    pub scale_to: f64,
    pub offset_from: Offset,
    pub offset_to: Offset,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub const CENTER: Offset = Offset { x: 0.0, y: 0.0 };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    pub src: String,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicTrack {
    pub src: String,
    pub volume: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub length: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub style: CaptionStyle,
    pub cues: Vec<CaptionCue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionStyle {
    pub name: String,
    pub font_family: String,
    pub font_size: u32,
    pub color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
    pub position: String,
    pub uppercase: bool,
    pub max_words_per_cue: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionCue {
    pub text: String,
    pub start: f64,
    pub end: f64,
}
