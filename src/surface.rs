use image::{Rgba, RgbaImage};

use crate::error::{RenderError, RenderResult};

/// A composed bitmap. Straight (non-premultiplied) RGBA, owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub(crate) fn from_pixmap(pixmap: &tiny_skia::Pixmap) -> RenderResult<Self> {
        let mut data = Vec::with_capacity(pixmap.data().len());
        for pixel in pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        let image = RgbaImage::from_raw(pixmap.width(), pixmap.height(), data)
            .ok_or_else(|| RenderError::surface("pixmap size does not match its data"))?;
        Ok(Self { image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        if x < self.width() && y < self.height() {
            Some(*self.image.get_pixel(x, y))
        } else {
            None
        }
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}
