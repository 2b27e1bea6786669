//! Letterboxing of the live preview.
//!
//! The preview of a camera with aspect ratio `target_aspect` is shown in the
//! largest centered rectangle of the screen with that aspect ratio. This has
//! no influence on captures, which always render full frame.

use crate::config::CameraConfig;

/// A rectangle in normalized screen coordinates (`[0, 1]` on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const FULL: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };
}

/// Compute the centered viewport preserving `target_aspect` (width / height).
pub fn recompute_viewport(screen_size: (u32, u32), target_aspect: f64) -> Rect {
    if !(target_aspect.is_finite() && target_aspect > 0.0) {
        return Rect::FULL;
    }
    let screen_w = f64::from(screen_size.0.max(1));
    let screen_h = f64::from(screen_size.1.max(1));
    let scale_height = (screen_w / screen_h) / target_aspect;
    if scale_height < 1.0 {
        // letterbox: bars top and bottom
        Rect {
            x: 0.0,
            y: (1.0 - scale_height) / 2.0,
            width: 1.0,
            height: scale_height,
        }
    } else {
        // pillarbox: bars left and right
        let scale_width = 1.0 / scale_height;
        Rect {
            x: (1.0 - scale_width) / 2.0,
            y: 0.0,
            width: scale_width,
            height: 1.0,
        }
    }
}

/// Remembers the last screen size so the viewport is only recomputed on
/// resize.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    target_aspect: f64,
    last_screen_size: Option<(u32, u32)>,
}

impl ViewportTracker {
    pub fn new(target_aspect: f64) -> Self {
        Self {
            target_aspect,
            last_screen_size: None,
        }
    }

    /// Track the preview of a camera with `config`.
    pub fn for_camera(config: &CameraConfig) -> Self {
        Self::new(config.aspect_ratio())
    }

    /// Returns the new viewport if the screen size changed since the last
    /// call, `None` otherwise.
    pub fn update(&mut self, screen_size: (u32, u32)) -> Option<Rect> {
        if self.last_screen_size == Some(screen_size) {
            return None;
        }
        self.last_screen_size = Some(screen_size);
        Some(recompute_viewport(screen_size, self.target_aspect))
    }

    /// Change the target aspect ratio, forcing a recompute on next update.
    pub fn set_target_aspect(&mut self, target_aspect: f64) {
        self.target_aspect = target_aspect;
        self.last_screen_size = None;
    }
}
