//! Catalogue of camera treatments for still images.
//!
//! Scene `i` always gets entry `i % CATALOGUE.len()`, so consecutive scenes
//! alternate movement and a replayed build picks the same treatment.

use super::model::{Motion, Offset};

/// What a treatment needs to know about the clip it animates.
#[derive(Debug, Clone, Copy)]
pub struct ClipFrame {
    /// Width divided by height.
    pub aspect: f64,
    /// Clip length in seconds.
    pub length: f64,
}

pub struct Treatment {
    pub name: &'static str,
    pub apply: fn(&ClipFrame) -> Motion,
}

pub static CATALOGUE: [Treatment; 5] = [
    Treatment { name: "zoom_in", apply: zoom_in },
    Treatment { name: "pan_left", apply: pan_left },
    Treatment { name: "zoom_out", apply: zoom_out },
    Treatment { name: "pan_right", apply: pan_right },
    Treatment { name: "drift_up", apply: drift_up },
];

const MAX_ZOOM: f64 = 1.25;
const PAN_SCALE: f64 = 1.15;

pub fn for_scene(index: usize) -> &'static Treatment {
    &CATALOGUE[index % CATALOGUE.len()]
}

pub fn motion_for(index: usize, frame: &ClipFrame) -> Motion {
    (for_scene(index).apply)(frame)
}

// Grows with clip length, capped at MAX_ZOOM.
fn zoom_amount(frame: &ClipFrame) -> f64 {
    (1.0 + 0.02 * frame.length).min(MAX_ZOOM)
}

// Portrait frames have less horizontal room to pan across.
fn pan_span(frame: &ClipFrame) -> f64 {
    if frame.aspect < 1.0 { 0.04 } else { 0.06 }
}

fn zoom_in(frame: &ClipFrame) -> Motion {
    Motion {
        treatment: "zoom_in".to_string(),
        scale_from: 1.0,
        scale_to: zoom_amount(frame),
        offset_from: Offset::CENTER,
        offset_to: Offset::CENTER,
    }
}

fn zoom_out(frame: &ClipFrame) -> Motion {
    Motion {
        treatment: "zoom_out".to_string(),
        scale_from: zoom_amount(frame),
        scale_to: 1.0,
        offset_from: Offset::CENTER,
        offset_to: Offset::CENTER,
    }
}

fn pan_left(frame: &ClipFrame) -> Motion {
    let span = pan_span(frame);
    Motion {
        treatment: "pan_left".to_string(),
        scale_from: PAN_SCALE,
        scale_to: PAN_SCALE,
        offset_from: Offset { x: span, y: 0.0 },
        offset_to: Offset { x: -span, y: 0.0 },
    }
}

fn pan_right(frame: &ClipFrame) -> Motion {
    let span = pan_span(frame);
    Motion {
        treatment: "pan_right".to_string(),
        scale_from: PAN_SCALE,
        scale_to: PAN_SCALE,
        offset_from: Offset { x: -span, y: 0.0 },
        offset_to: Offset { x: span, y: 0.0 },
    }
}

fn drift_up(_frame: &ClipFrame) -> Motion {
    Motion {
        treatment: "drift_up".to_string(),
        scale_from: 1.1,
        scale_to: 1.1,
        offset_from: Offset { x: 0.0, y: 0.04 },
        offset_to: Offset { x: 0.0, y: -0.04 },
    }
}
