/// Rendered width of a string in pixels for the active font and size.
pub trait TextMeasurer {
    fn measure(&self, text: &str) -> f32;
}

impl<F> TextMeasurer for F
where
    F: Fn(&str) -> f32,
{
    fn measure(&self, text: &str) -> f32 {
        self(text)
    }
}

/// Vertical distance between consecutive lines, as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Captions are never drawn smaller than this, whatever the scale.
pub const MIN_FONT_SIZE: f32 = 10.0;

const FONT_SIZE_DIVISOR: u32 = 15;

/// Greedy word wrap. A word is appended to the current line while the joined
/// line measures strictly under `max_width`; otherwise the line is flushed.
/// Words are never split, so a single oversized word gets a line of its own.
pub fn wrap_text<M>(text: &str, max_width: f32, measurer: &M) -> Vec<String>
where
    M: TextMeasurer + ?Sized,
{
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    let mut current = first.to_string();
    for word in words {
        let candidate = format!("{} {}", current, word);
        if measurer.measure(&candidate) < max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}

/// Meme captions are set in capitals.
pub fn normalize_caption(text: &str) -> String {
    text.trim().to_uppercase()
}

pub fn caption_font_size(image_width: u32, font_scale: f32) -> f32 {
    let base = (image_width / FONT_SIZE_DIVISOR) as f32;
    (base * font_scale).max(MIN_FONT_SIZE)
}

pub fn line_height(font_size: f32) -> f32 {
    font_size * LINE_HEIGHT_FACTOR
}
