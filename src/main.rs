use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use memegen_rust::{Align, CaptionPositions, Config, PositionOverride, StyleOptions};

#[derive(Parser, Debug)]
#[command(
    name = "memegen-rust",
    version,
    about = "Caption meme templates and images"
)]
struct Cli {
    /// Template id (see --show-templates). A random template is used when
    /// neither --template nor --image is given.
    #[arg(short = 't', long = "template")]
    template: Option<String>,

    /// Background image: local path, file://, http(s):// or data: URI
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Top caption
    #[arg(long = "top", default_value = "")]
    top: String,

    /// Bottom caption
    #[arg(long = "bottom", default_value = "")]
    bottom: String,

    /// Font size multiplier
    #[arg(long = "font-scale")]
    font_scale: Option<f32>,

    /// Outline width in pixels (0 disables the outline)
    #[arg(long = "stroke-width")]
    stroke_width: Option<f32>,

    /// Caption fill color (CSS color)
    #[arg(long = "fill")]
    fill: Option<String>,

    /// Caption outline color (CSS color)
    #[arg(long = "stroke")]
    stroke: Option<String>,

    /// left, center or right
    #[arg(long = "align")]
    align: Option<Align>,

    /// Draw a drop shadow behind each caption line
    #[arg(long = "shadow")]
    shadow: bool,

    /// Turn the drop shadow off (story renders enable it by default)
    #[arg(long = "no-shadow", conflicts_with = "shadow")]
    no_shadow: bool,

    /// Top caption position as fractions of the image: x,y[,max_width]
    #[arg(long = "top-pos")]
    top_pos: Option<PositionOverride>,

    /// Bottom caption position as fractions of the image: x,y[,max_width]
    #[arg(long = "bottom-pos")]
    bottom_pos: Option<PositionOverride>,

    /// Render the 1080x1920 story variant
    #[arg(long = "story")]
    story: bool,

    /// Output file (default: meme.<ext>)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp, gif, tiff or a mime type
    #[arg(long = "format")]
    format: Option<String>,

    /// JPEG quality between 0 and 1
    #[arg(long = "quality")]
    quality: Option<f32>,

    /// Print a PNG data URI instead of writing a file
    #[arg(long = "data-uri")]
    data_uri: bool,

    /// Store the result in the local gallery
    #[arg(long = "save")]
    save: bool,

    /// Show available templates and exit
    #[arg(long = "show-templates")]
    show_templates: bool,

    /// Show a gallery page (newest first) and exit
    #[arg(long = "show-gallery", num_args = 0..=1, default_missing_value = "0")]
    show_gallery: Option<usize>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Serve the HTTP API (default address from settings [server])
    #[arg(long = "serve", num_args = 0..=1, default_missing_value = "")]
    serve: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    memegen_rust::logging::init(cli.verbose)?;

    if let Some(addr) = cli.serve.as_deref() {
        let settings_path = cli.read_settings.as_deref().map(Path::new);
        let settings = memegen_rust::settings::load_settings(settings_path)?;
        let addr = if addr.trim().is_empty() {
            settings.server_addr.clone()
        } else {
            addr.trim().to_string()
        };
        return memegen_rust::server::run_server(settings, addr).await;
    }

    let output = memegen_rust::run(config_from_cli(cli)).await?;
    println!("{}", output);
    Ok(())
}

fn config_from_cli(cli: Cli) -> Config {
    Config {
        template: cli.template,
        image: cli.image,
        top: cli.top,
        bottom: cli.bottom,
        style: StyleOptions {
            font_scale: cli.font_scale,
            stroke_width: cli.stroke_width,
            fill_color: cli.fill,
            stroke_color: cli.stroke,
            align: cli.align,
            shadow: shadow_flag(cli.shadow, cli.no_shadow),
        },
        positions: CaptionPositions {
            top: cli.top_pos,
            bottom: cli.bottom_pos,
        },
        story: cli.story,
        output: cli.output,
        format: cli.format,
        quality: cli.quality,
        data_uri: cli.data_uri,
        save: cli.save,
        settings_path: cli.read_settings,
        show_templates: cli.show_templates,
        show_gallery: cli.show_gallery,
    }
}

fn shadow_flag(shadow: bool, no_shadow: bool) -> Option<bool> {
    match (shadow, no_shadow) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}
