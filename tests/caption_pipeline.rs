use memegen_rust::caption::{
    Anchor, CaptionFont, CaptionScene, CaptionSlot, ImagePlacement, StyleProfile, resolve_style,
};
use memegen_rust::{
    CaptionPositions, Compositor, ImageSource, PositionOverride, StyleOptions, TemplateCatalog,
    export, format_templates,
};

fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba(color));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn template_listing_snapshot() {
    let listing = format_templates(&TemplateCatalog::builtin());
    insta::assert_snapshot!(listing, @r"
drake	Drake Hotline Bling
distracted	Distracted Boyfriend
expanding-brain	Expanding Brain
two-buttons	Two Buttons
change-my-mind	Change My Mind
success-kid	Success Kid
one-does-not-simply	One Does Not Simply
batman-slap	Batman Slapping Robin
is-this	Is This A Pigeon
doge	Doge
");
}

#[test]
fn drake_caption_lines_snapshot() {
    let font = CaptionFont::estimated();
    let style = resolve_style(&StyleOptions::default(), StyleProfile::Standard);
    let mut scene = CaptionScene::new(700, 700, ImagePlacement::full(700, 700));
    let anchor = Anchor {
        x: 350.0,
        y: 100.0,
        max_width: 300.0,
    };
    scene.push_caption(
        CaptionSlot::Top,
        "hello world this is a test",
        anchor,
        &style,
        40.0,
        &font,
    );
    let lines = scene
        .block(CaptionSlot::Top)
        .unwrap()
        .lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(lines, @r"
HELLO WORLD
THIS IS A TEST
");
}

#[tokio::test]
async fn empty_bottom_caption_leaves_source_pixels() {
    let compositor = Compositor::new(CaptionFont::estimated());
    let source = ImageSource::Bytes {
        bytes: solid_png(120, 90, [10, 200, 30, 255]),
        name: Some("green.png".to_string()),
    };
    let positions = CaptionPositions {
        top: Some(PositionOverride {
            x_pct: Some(0.5),
            y_pct: Some(0.1),
            max_width_pct: Some(0.5),
        }),
        bottom: None,
    };
    let surface = compositor
        .render_captioned_source(source, "only top", "", &StyleOptions::default(), &positions)
        .await
        .unwrap();
    assert_eq!(surface.dimensions(), (120, 90));
    for y in 70..90 {
        assert_eq!(surface.pixel(60, y).unwrap().0, [10, 200, 30, 255]);
    }
}

#[tokio::test]
async fn story_png_has_black_bars() {
    let compositor = Compositor::new(CaptionFont::estimated());
    let source = ImageSource::Bytes {
        bytes: solid_png(200, 100, [250, 250, 250, 255]),
        name: None,
    };
    let png = compositor
        .render_story(source, "top", "bottom", &StyleOptions::default())
        .await
        .unwrap();
    let story = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(story.dimensions(), (1080, 1920));
    assert_eq!(story.get_pixel(10, 10).0, [0, 0, 0, 255]);
    assert_eq!(story.get_pixel(1070, 1910).0, [0, 0, 0, 255]);
    assert_eq!(story.get_pixel(540, 960).0, [250, 250, 250, 255]);
}

#[test]
fn jpeg_export_is_smaller_at_low_quality() {
    let mut image = image::RgbaImage::new(48, 48);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        *pixel = image::Rgba([(x * 5) as u8, (y * 5) as u8, 128, 255]);
    }
    let surface = memegen_rust::Surface::from_image(image);
    let low = export::to_blob(&surface, "image/jpeg", 0.2).unwrap();
    let high = export::to_blob(&surface, "image/jpeg", 0.92).unwrap();
    assert!(low.len() < high.len());
}
