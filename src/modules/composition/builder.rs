use super::captions::{cues_for_scene, resolve_style, round_ms};
use super::model::{
    AudioClip, CaptionTrack, CompositionPayload, MusicTrack, OutputSpec, RenderOptions,
    SceneTrack, VisualClip,
};
use super::treatments::{ClipFrame, motion_for};
use crate::modules::job::model::ProcessedScene;

pub const DEFAULT_ASPECT_RATIO: &str = "9:16";

const RESOLUTIONS: &[(&str, u32, u32)] = &[
    ("16:9", 1920, 1080),
    ("9:16", 1080, 1920),
    ("1:1", 1080, 1080),
    ("4:5", 1080, 1350),
    ("4:3", 1440, 1080),
];

const OUTPUT_FORMAT: &str = "mp4";
const OUTPUT_FPS: u32 = 30;
const NARRATION_VOLUME: f64 = 1.0;
const MUSIC_VOLUME: f64 = 0.15;
const MUSIC_FADE_IN: f64 = 1.5;
const MUSIC_FADE_OUT: f64 = 2.0;

/// Output dimensions for an aspect ratio label, with the label actually used.
pub fn resolution_for(aspect_ratio: &str) -> (&'static str, u32, u32) {
    let wanted = aspect_ratio.trim();
    RESOLUTIONS
        .iter()
        .find(|(label, _, _)| *label == wanted)
        .or_else(|| RESOLUTIONS.iter().find(|(label, _, _)| *label == DEFAULT_ASPECT_RATIO))
        .copied()
        .unwrap_or(RESOLUTIONS[1])
}

/// Assemble the render payload. Scenes are laid end to end in the order
/// given; callers pass them in scene-index order.
pub fn build(scenes: &[ProcessedScene], options: &RenderOptions) -> CompositionPayload {
    let (aspect_label, width, height) = resolution_for(&options.aspect_ratio);
    let aspect = width as f64 / height as f64;
    let caption_style = options
        .enable_captions
        .then(|| resolve_style(&options.caption_style));

    let mut start = 0.0;
    let mut tracks = Vec::with_capacity(scenes.len());
    let mut cues = Vec::new();

    for scene in scenes {
        let length = round_ms(scene.duration.max(0.0));
        let frame = ClipFrame { aspect, length };

        if let Some(style) = &caption_style {
            cues.extend(cues_for_scene(&scene.text, start, length, style));
        }

        tracks.push(SceneTrack {
            index: scene.index,
            start: round_ms(start),
            length,
            visual: VisualClip {
                src: scene.asset_url.clone(),
                fit: "cover".to_string(),
                motion: motion_for(scene.index, &frame),
            },
            audio: AudioClip {
                src: scene.audio_url.clone(),
                volume: NARRATION_VOLUME,
            },
        });

        start = round_ms(start + length);
    }

    let duration = start;

    let music = match (&options.background_music_url, options.enable_background_music) {
        (Some(src), true) if !src.trim().is_empty() => Some(MusicTrack {
            src: src.clone(),
            volume: MUSIC_VOLUME,
            fade_in: MUSIC_FADE_IN,
            fade_out: MUSIC_FADE_OUT,
            looped: true,
            length: duration,
        }),
        _ => None,
    };

    CompositionPayload {
        output: OutputSpec {
            format: OUTPUT_FORMAT.to_string(),
            fps: OUTPUT_FPS,
            width,
            height,
            aspect_ratio: aspect_label.to_string(),
        },
        duration,
        scenes: tracks,
        music,
        captions: caption_style.map(|style| CaptionTrack { style, cues }),
    }
}
