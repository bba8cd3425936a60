mod font;
mod layout;
mod position;
mod render;
mod style;

pub use font::{CAPTION_FONT_STACK, CaptionFont, FontMeasurer, FontMetrics, load_font_metrics};
pub use layout::{
    LINE_HEIGHT_FACTOR, MIN_FONT_SIZE, TextMeasurer, caption_font_size, line_height,
    normalize_caption, wrap_text,
};
pub use position::{
    Anchor, CaptionPositions, CaptionSlot, DEFAULT_OVERRIDE_MAX_WIDTH_PCT, PositionOverride,
    freeform_anchor, resolve_anchor,
};
pub(crate) use position::centered_block_x;
pub use render::{CaptionBlock, CaptionScene, ImagePlacement, PlacedLine, rasterize_svg};
pub use style::{Align, Style, StyleOptions, StyleProfile, resolve_style};
