use chitram::batch::{self, ToolSettings};
use chitram::config::{self, ChitramConfig};
use chitram::imaging::{
    AspectPreset, Color, CropRegion, FontdueGlyphs, GlyphRasterizer, OutputFormat, RustBackend,
};
use chitram::output;
use chitram::tools::Tool;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chitram")]
#[command(about = "Raster image toolkit: compress, crop, resize, convert, upscale, watermark")]
#[command(long_about = "\
Raster image toolkit: compress, crop, resize, convert, upscale, watermark

Every command takes one or more inputs. Directories are searched
recursively for images (jpg, png, tif, webp, ...). Each input is
processed independently and written to the output directory under the
tool's name:

  compressed.jpeg   cropped.png   resized.png   converted.webp
  upscaled_x2.png   watermarked.jpg

With several inputs, names are prefixed by the input's stem
(beach-compressed.jpeg) so nothing is overwritten.

Defaults come from chitram.toml when present; flags override it.
Run 'chitram gen-config' to print a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = "chitram.toml", global = true)]
    config: PathBuf,

    /// Directory exports are written to
    #[arg(long, short = 'o', default_value = ".", global = true)]
    output_dir: PathBuf,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print one JSON object per input instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Files or directories to process.
#[derive(Args)]
struct Inputs {
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode, lowering quality then size until under a target
    Compress {
        #[command(flatten)]
        inputs: Inputs,
        /// Output format (jpeg, png, webp, avif)
        #[arg(long, short)]
        format: Option<OutputFormat>,
        /// Size budget in kilobytes; 0 for a single encode
        #[arg(long, short)]
        target_kb: Option<u32>,
    },
    /// Cut out a region
    Crop {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, short)]
        format: Option<OutputFormat>,
        /// free, 1:1, 4:3, 3:2, 16:9, 9:16, or any W:H
        #[arg(long, short)]
        aspect: Option<AspectPreset>,
        /// Selection as X,Y,WIDTH,HEIGHT in source pixels
        #[arg(long, short)]
        region: Option<CropRegion>,
    },
    /// Scale to an exact size
    Resize {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, short)]
        format: Option<OutputFormat>,
        #[arg(long, short = 'W')]
        width: Option<u32>,
        #[arg(long, short = 'H')]
        height: Option<u32>,
        /// Do not derive a missing side from the aspect ratio
        #[arg(long)]
        no_lock: bool,
    },
    /// Change format
    Convert {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, short)]
        format: Option<OutputFormat>,
        /// Encoder quality percent, 1-100 (lossy formats)
        #[arg(long, short)]
        quality: Option<u32>,
    },
    /// Magnify by an integer factor
    Upscale {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, short)]
        format: Option<OutputFormat>,
        #[arg(long, short = 'x')]
        factor: Option<u32>,
    },
    /// Draw text on the image; always exported as JPEG
    Watermark {
        #[command(flatten)]
        inputs: Inputs,
        #[arg(long, short)]
        text: Option<String>,
        /// Font size in pixels
        #[arg(long, short)]
        size: Option<u32>,
        /// #rgb, #rrggbb or #rrggbbaa
        #[arg(long, short)]
        color: Option<Color>,
        /// Horizontal center, percent of width
        #[arg(long)]
        x: Option<f32>,
        /// Baseline, percent of height
        #[arg(long)]
        y: Option<f32>,
        /// Font file (defaults to a bold system sans)
        #[arg(long)]
        font: Option<PathBuf>,
    },
    /// Print a stock chitram.toml with all options documented
    GenConfig,
}

impl Command {
    /// Write flag values over the loaded config; returns the tool and its inputs.
    fn apply(self, config: &mut ChitramConfig) -> Option<(Tool, Vec<PathBuf>)> {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        match self {
            Command::Compress {
                inputs,
                format,
                target_kb,
            } => {
                set(&mut config.compress.format, format);
                set(&mut config.compress.target_kb, target_kb);
                Some((Tool::Compress, inputs.inputs))
            }
            Command::Crop {
                inputs,
                format,
                aspect,
                region,
            } => {
                set(&mut config.crop.format, format);
                set(&mut config.crop.aspect, aspect);
                if region.is_some() {
                    config.crop.region = region;
                }
                Some((Tool::Crop, inputs.inputs))
            }
            Command::Resize {
                inputs,
                format,
                width,
                height,
                no_lock,
            } => {
                set(&mut config.resize.format, format);
                if width.is_some() {
                    config.resize.width = width;
                }
                if height.is_some() {
                    config.resize.height = height;
                }
                if no_lock {
                    config.resize.lock_aspect = false;
                }
                Some((Tool::Resize, inputs.inputs))
            }
            Command::Convert {
                inputs,
                format,
                quality,
            } => {
                set(&mut config.convert.format, format);
                if quality.is_some() && !config.convert.format.is_lossy() {
                    warn!(
                        format = %config.convert.format,
                        "--quality has no effect on a lossless format"
                    );
                }
                set(&mut config.convert.quality, quality);
                Some((Tool::Convert, inputs.inputs))
            }
            Command::Upscale {
                inputs,
                format,
                factor,
            } => {
                set(&mut config.upscale.format, format);
                set(&mut config.upscale.factor, factor);
                Some((Tool::Upscale, inputs.inputs))
            }
            Command::Watermark {
                inputs,
                text,
                size,
                color,
                x,
                y,
                font,
            } => {
                let wm = &mut config.watermark;
                set(&mut wm.text, text);
                set(&mut wm.font_size, size);
                set(&mut wm.color, color.map(|c| c.to_string()));
                set(&mut wm.x, x);
                set(&mut wm.y, y);
                if font.is_some() {
                    wm.font = font;
                }
                Some((Tool::Watermark, inputs.inputs))
            }
            Command::GenConfig => None,
        }
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
        _ => config::load_config(&cli.config)?,
    };
    let Some((tool, paths)) = cli.command.apply(&mut config) else {
        return Ok(ExitCode::SUCCESS);
    };
    config.validate()?;

    let settings = config.tool_settings(tool)?;
    let glyphs = load_glyphs(&settings, &config)?;
    let inputs = batch::collect_inputs(&paths)?;

    init_thread_pool(&config.processing);
    let items = batch::run_batch(
        &inputs,
        &settings,
        &RustBackend::new(),
        &cli.output_dir,
        glyphs,
    );

    if cli.json {
        output::print_json(&items)?;
    } else {
        output::print_items(&items);
    }

    if items.iter().any(|item| item.is_failure()) {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Log to stderr: warnings by default, `-v` info, `-vv` debug.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// A font is loaded only when there is watermark text to draw.
fn load_glyphs(
    settings: &ToolSettings,
    config: &ChitramConfig,
) -> Result<Option<Arc<dyn GlyphRasterizer>>, Box<dyn std::error::Error>> {
    match settings {
        ToolSettings::Watermark { spec } if !spec.text.is_empty() => {
            let glyphs = FontdueGlyphs::load(config.watermark.font.as_deref())?;
            Ok(Some(Arc::new(glyphs)))
        }
        _ => Ok(None),
    }
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores: config can lower it, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
