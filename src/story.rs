use crate::caption::{Align, Anchor, CaptionSlot, ImagePlacement, centered_block_x};

pub const STORY_WIDTH: u32 = 1080;
pub const STORY_HEIGHT: u32 = 1920;
pub const STORY_BACKDROP: &str = "black";

const STORY_TOP_Y_PCT: f32 = 0.05;
const STORY_BOTTOM_Y_PCT: f32 = 0.8;
const STORY_MAX_WIDTH_PCT: f32 = 0.9;

/// Destination rectangle of a scaled source, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<FitRect> for ImagePlacement {
    fn from(rect: FitRect) -> Self {
        ImagePlacement {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Largest aspect-preserving rectangle of `src` that fits inside `dst`,
/// centered on both axes.
pub fn contain_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> FitRect {
    let (dst_w, dst_h) = (dst_w as f32, dst_h as f32);
    if src_w == 0 || src_h == 0 {
        return FitRect {
            x: dst_w / 2.0,
            y: dst_h / 2.0,
            width: 0.0,
            height: 0.0,
        };
    }
    let (src_w, src_h) = (src_w as f32, src_h as f32);
    let scale = (dst_w / src_w).min(dst_h / src_h);
    let width = src_w * scale;
    let height = src_h * scale;
    FitRect {
        x: (dst_w - width) / 2.0,
        y: (dst_h - height) / 2.0,
        width,
        height,
    }
}

pub fn story_anchor(slot: CaptionSlot, align: Align) -> Anchor {
    let (w, h) = (STORY_WIDTH as f32, STORY_HEIGHT as f32);
    let y_pct = match slot {
        CaptionSlot::Top => STORY_TOP_Y_PCT,
        CaptionSlot::Bottom => STORY_BOTTOM_Y_PCT,
    };
    let max_width = w * STORY_MAX_WIDTH_PCT;
    Anchor {
        x: centered_block_x(w, max_width, align),
        y: h * y_pct,
        max_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_source_is_letterboxed_vertically() {
        let rect = contain_fit(1000, 500, STORY_WIDTH, STORY_HEIGHT);
        assert_eq!(rect.width, 1080.0);
        assert_eq!(rect.height, 540.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, 690.0);
    }

    #[test]
    fn tall_source_is_pillarboxed() {
        let rect = contain_fit(100, 400, STORY_WIDTH, STORY_HEIGHT);
        assert_eq!(rect.height, 1920.0);
        assert_eq!(rect.width, 480.0);
        assert_eq!(rect.x, 300.0);
        assert_eq!(rect.y, 0.0);
    }

    #[test]
    fn empty_source_collapses_to_the_center() {
        let rect = contain_fit(0, 10, 100, 100);
        assert_eq!((rect.width, rect.height), (0.0, 0.0));
        assert_eq!((rect.x, rect.y), (50.0, 50.0));
    }

    #[test]
    fn story_captions_sit_at_five_and_eighty_percent() {
        let top = story_anchor(CaptionSlot::Top, Align::Center);
        let bottom = story_anchor(CaptionSlot::Bottom, Align::Center);
        assert_eq!(top.y, 96.0);
        assert_eq!(bottom.y, 1536.0);
        assert_eq!(top.x, 540.0);
        assert_eq!(top.max_width, 972.0);

        let left = story_anchor(CaptionSlot::Top, Align::Left);
        assert_eq!(left.x, 54.0);
    }
}
