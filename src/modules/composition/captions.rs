//! Subtitle styles and cue timing.

use super::model::{CaptionCue, CaptionStyle};

pub const DEFAULT_STYLE: &str = "classic";

struct Preset {
    name: &'static str,
    font_family: &'static str,
    font_size: u32,
    color: &'static str,
    stroke_color: &'static str,
    stroke_width: u32,
    background: Option<&'static str>,
    highlight_color: Option<&'static str>,
    position: &'static str,
    uppercase: bool,
    max_words_per_cue: usize,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "classic",
        font_family: "Inter",
        font_size: 48,
        color: "#FFFFFF",
        stroke_color: "#000000",
        stroke_width: 3,
        background: None,
        highlight_color: None,
        position: "bottom",
        uppercase: false,
        max_words_per_cue: 6,
    },
    Preset {
        name: "bold",
        font_family: "Montserrat ExtraBold",
        font_size: 64,
        color: "#FFFFFF",
        stroke_color: "#000000",
        stroke_width: 6,
        background: None,
        highlight_color: None,
        position: "center",
        uppercase: true,
        max_words_per_cue: 3,
    },
    Preset {
        name: "minimal",
        font_family: "Helvetica Neue",
        font_size: 40,
        color: "#F5F5F5",
        stroke_color: "#000000",
        stroke_width: 0,
        background: Some("#00000099"),
        highlight_color: None,
        position: "bottom",
        uppercase: false,
        max_words_per_cue: 8,
    },
    Preset {
        name: "karaoke",
        font_family: "Poppins Bold",
        font_size: 56,
        color: "#FFFFFF",
        stroke_color: "#000000",
        stroke_width: 4,
        background: None,
        highlight_color: Some("#FFD400"),
        position: "center",
        uppercase: false,
        max_words_per_cue: 4,
    },
    Preset {
        name: "neon",
        font_family: "Bebas Neue",
        font_size: 60,
        color: "#39FF14",
        stroke_color: "#0B0033",
        stroke_width: 4,
        background: None,
        highlight_color: Some("#FF2BD6"),
        position: "bottom",
        uppercase: true,
        max_words_per_cue: 4,
    },
];

impl Preset {
    fn to_style(&self) -> CaptionStyle {
        CaptionStyle {
            name: self.name.to_string(),
            font_family: self.font_family.to_string(),
            font_size: self.font_size,
            color: self.color.to_string(),
            stroke_color: self.stroke_color.to_string(),
            stroke_width: self.stroke_width,
            background: self.background.map(str::to_string),
            highlight_color: self.highlight_color.map(str::to_string),
            position: self.position.to_string(),
            uppercase: self.uppercase,
            max_words_per_cue: self.max_words_per_cue,
        }
    }
}

/// Look up a caption style by name, case-insensitively. Unknown names get
/// the default style.
pub fn resolve_style(name: &str) -> CaptionStyle {
    let wanted = name.trim();
    PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(wanted))
        .or_else(|| PRESETS.iter().find(|p| p.name == DEFAULT_STYLE))
        .unwrap_or(&PRESETS[0])
        .to_style()
}

/// Split one scene's narration into cues inside `[start, start + length]`.
///
/// Each cue holds at most `style.max_words_per_cue` words and gets a slice
/// of the window proportional to its word count. The last cue always ends
/// exactly at the end of the window.
pub fn cues_for_scene(text: &str, start: f64, length: f64, style: &CaptionStyle) -> Vec<CaptionCue> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || length <= 0.0 {
        return Vec::new();
    }

    let per_cue = style.max_words_per_cue.max(1);
    let total = words.len() as f64;
    let end_of_window = start + length;
    let chunks: Vec<&[&str]> = words.chunks(per_cue).collect();
    let last = chunks.len() - 1;

    let mut cursor = start;
    let mut spoken = 0usize;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            spoken += chunk.len();
            let end = if i == last {
                end_of_window
            } else {
                round_ms(start + length * (spoken as f64 / total))
            };
            let joined = chunk.join(" ");
            let cue = CaptionCue {
                text: if style.uppercase { joined.to_uppercase() } else { joined },
                start: round_ms(cursor),
                end: round_ms(end),
            };
            cursor = end;
            cue
        })
        .collect()
}

pub(crate) fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
