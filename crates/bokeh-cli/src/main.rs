//! `bokeh` - blur TGA images and swap their color channels.
//!
//! Exit codes for `blur`: 100 argument error, 1 input could not be loaded,
//! 2 image size out of range, 3 allocation failure, 4 kernel could not be
//! built, 5 output could not be written. `swap-channels` exits with the
//! decoder's error code when its input is rejected and 5 when the output
//! cannot be written.
//!
//! The TGA origin flag is not honored on input and every output is written
//! top-origin, so a bottom-origin input comes back vertically flipped.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use bokeh_core::tga::{self, DecodeLimits};
use bokeh_core::{blur, BlurError, ImageBuffer, ImageError, Kernel, TgaError};
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const EXIT_ARGS: u8 = 100;
const EXIT_LOAD: u8 = 1;
const EXIT_DIMENSIONS: u8 = 2;
const EXIT_ALLOC: u8 = 3;
const EXIT_KERNEL: u8 = 4;
const EXIT_WRITE: u8 = 5;

/// Accepted image side length for blurring.
const MIN_SIDE: u32 = 64;
const MAX_SIDE: u32 = 16320;

#[derive(Parser, Debug)]
#[command(name = "bokeh", version, about, arg_required_else_help = true)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Blur an image with a bokeh kernel of the given size.
    ///
    /// The kernel size determines the amount of blur and may be decimal,
    /// e.g. 2.5 pixels. The output is written top-origin; rows of a
    /// bottom-origin input are not reordered, so it comes out flipped.
    Blur(BlurArgs),

    /// Swap the red and blue channels of a TGA image.
    ///
    /// Rows are copied in file order and written top-origin, so a
    /// bottom-origin input is flipped vertically.
    SwapChannels(SwapArgs),
}

#[derive(Args, Debug)]
struct BlurArgs {
    /// Kernel radius in pixels, greater than 1.0.
    #[arg(value_parser = parse_radius)]
    radius: f32,

    /// Input TGA file.
    input: PathBuf,

    /// Output TGA file.
    output: PathBuf,

    /// Number of worker threads.
    #[arg(long, default_value_t = bokeh_core::DEFAULT_THREADS,
          value_parser = clap::value_parser!(u16).range(1..).map(usize::from))]
    threads: usize,

    /// Refuse input images with more pixels than this.
    #[arg(long, default_value_t = DecodeLimits::UNLIMITED.max_pixels)]
    max_pixels: u64,
}

#[derive(Args, Debug)]
struct SwapArgs {
    /// Input TGA file; standard input when omitted.
    input: Option<PathBuf>,

    /// Output TGA file; standard output when omitted.
    output: Option<PathBuf>,
}

fn parse_radius(s: &str) -> Result<f32, String> {
    let radius: f64 = s
        .parse()
        .map_err(|_| format!("`{s}` is not a number"))?;
    if radius.is_nan() || radius <= 1.0 {
        return Err("Negative kernel size or kernel size < 1.0 makes no sense.".to_string());
    }
    Ok(radius as f32)
}

/// An error together with the exit code it maps to.
#[derive(Debug)]
struct Failure {
    code: u8,
    error: anyhow::Error,
}

impl Failure {
    fn new(code: u8, error: impl Into<anyhow::Error>) -> Self {
        Failure {
            code,
            error: error.into(),
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_ARGS)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Blur(args) => run_blur(&args),
        Command::SwapChannels(args) => run_swap(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("error: {:#}", failure.error);
            ExitCode::from(failure.code)
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_blur(args: &BlurArgs) -> Result<(), Failure> {
    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        radius = args.radius,
        "processing"
    );

    let limits = DecodeLimits::pixels(args.max_pixels);
    let input = File::open(&args.input)
        .with_context(|| format!("Image load error: {}", args.input.display()))
        .map_err(|e| Failure::new(EXIT_LOAD, e))?;
    let image = tga::decode(BufReader::new(input), limits).map_err(|e| {
        let code = match e {
            TgaError::AllocationFailed { .. } => EXIT_ALLOC,
            _ => EXIT_LOAD,
        };
        Failure::new(code, anyhow::Error::new(e).context("Image load error"))
    })?;

    check_dimensions(&image)?;

    let kernel = Kernel::new(args.radius)
        .context("Could not init kernel")
        .map_err(|e| Failure::new(EXIT_KERNEL, e))?;
    debug!(width = kernel.width(), center = kernel.center(), "kernel built");

    let blurred = blur(&image, &kernel, args.threads).map_err(|e| {
        let code = match e {
            BlurError::Image(ImageError::AllocationFailed { .. }) => EXIT_ALLOC,
            _ => EXIT_ARGS,
        };
        Failure::new(code, e)
    })?;

    write_tga(&blurred, &args.output).map_err(|e| Failure::new(EXIT_WRITE, e))?;
    info!(output = %args.output.display(), "done");
    Ok(())
}

fn check_dimensions(image: &ImageBuffer) -> Result<(), Failure> {
    let (w, h) = (image.width(), image.height());
    if w < MIN_SIDE || h < MIN_SIDE {
        return Err(Failure::new(
            EXIT_DIMENSIONS,
            anyhow::anyhow!("Sorry, image size must be at least {MIN_SIDE}x{MIN_SIDE} (got {w}x{h})."),
        ));
    }
    if w > MAX_SIDE || h > MAX_SIDE {
        return Err(Failure::new(
            EXIT_DIMENSIONS,
            anyhow::anyhow!("Sorry, image size too large (got {w}x{h}, max {MAX_SIDE}x{MAX_SIDE})."),
        ));
    }
    Ok(())
}

fn write_tga(image: &ImageBuffer, path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    tga::encode(image, BufWriter::new(file)).with_context(|| format!("writing {}", path.display()))
}

fn run_swap(args: &SwapArgs) -> Result<(), Failure> {
    let source: Box<dyn Read> = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening {}", path.display()))
                .map_err(|e| Failure::new(EXIT_LOAD, e))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let mut image = tga::decode(source, DecodeLimits::UNLIMITED)
        .map_err(|e| Failure::new(e.code(), e))?;
    image.swap_red_blue();

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating {}", path.display()))
                .map_err(|e| Failure::new(EXIT_WRITE, e))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };
    tga::encode(&image, sink).map_err(|e| Failure::new(EXIT_WRITE, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bokeh_core::Bitdepth;
    use clap::CommandFactory;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("bokeh-cli-{}-{name}", std::process::id()))
    }

    fn write_image(path: &Path, width: u32, height: u32) {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 77]);
            }
        }
        let image = ImageBuffer::from_raw(width, height, Bitdepth::Bgr24, pixels).unwrap();
        write_tga(&image, path).unwrap();
    }

    fn blur_args(radius: f32, input: PathBuf, output: PathBuf) -> BlurArgs {
        BlurArgs {
            radius,
            input,
            output,
            threads: 2,
            max_pixels: u64::MAX,
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_blur() {
        let cli = Cli::try_parse_from(["bokeh", "blur", "2.5", "in.tga", "out.tga"]).unwrap();
        match cli.command {
            Command::Blur(args) => {
                assert_eq!(args.radius, 2.5);
                assert_eq!(args.input, PathBuf::from("in.tga"));
                assert_eq!(args.threads, 4);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_small_radius() {
        let err = Cli::try_parse_from(["bokeh", "blur", "1.0", "a", "b"]).unwrap_err();
        assert!(err.use_stderr());
        assert!(Cli::try_parse_from(["bokeh", "blur", "abc", "a", "b"]).is_err());
    }

    #[test]
    fn test_parse_missing_output() {
        assert!(Cli::try_parse_from(["bokeh", "blur", "3", "in.tga"]).is_err());
    }

    #[test]
    fn test_parse_rejects_zero_threads() {
        assert!(Cli::try_parse_from(["bokeh", "blur", "3", "a", "b", "--threads", "0"]).is_err());
    }

    #[test]
    fn test_parse_threads() {
        let cli = Cli::try_parse_from(["bokeh", "blur", "3", "a", "b", "--threads", "7"]).unwrap();
        match cli.command {
            Command::Blur(args) => assert_eq!(args.threads, 7),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["bokeh", "blur", "3", "a", "b", "--threads", "70000"]).is_err());
    }

    #[test]
    fn test_blur_small_image_is_dimension_error() {
        let input = scratch("small.tga");
        write_image(&input, 10, 10);
        let failure = run_blur(&blur_args(3.0, input.clone(), scratch("small-out.tga"))).unwrap_err();
        assert_eq!(failure.code, EXIT_DIMENSIONS);
        let _ = std::fs::remove_file(input);
    }

    #[test]
    fn test_blur_missing_input_is_load_error() {
        let failure = run_blur(&blur_args(3.0, scratch("nope.tga"), scratch("nope-out.tga")))
            .unwrap_err();
        assert_eq!(failure.code, EXIT_LOAD);
    }

    #[test]
    fn test_blur_degenerate_kernel_is_kernel_error() {
        let input = scratch("kernel.tga");
        write_image(&input, 64, 64);
        let failure = run_blur(&blur_args(1.5, input.clone(), scratch("kernel-out.tga"))).unwrap_err();
        assert_eq!(failure.code, EXIT_KERNEL);
        let _ = std::fs::remove_file(input);
    }

    #[test]
    fn test_blur_writes_output() {
        let input = scratch("ok.tga");
        let output = scratch("ok-out.tga");
        write_image(&input, 70, 64);
        run_blur(&blur_args(2.0, input.clone(), output.clone())).unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let image = tga::decode(&bytes[..], DecodeLimits::UNLIMITED).unwrap();
        assert_eq!((image.width(), image.height()), (70, 64));
        let _ = std::fs::remove_file(input);
        let _ = std::fs::remove_file(output);
    }

    #[test]
    fn test_swap_channels_files() {
        let input = scratch("swap.tga");
        let output = scratch("swap-out.tga");
        write_image(&input, 3, 2);
        run_swap(&SwapArgs {
            input: Some(input.clone()),
            output: Some(output.clone()),
        })
        .unwrap();

        let bytes = std::fs::read(&output).unwrap();
        let image = tga::decode(&bytes[..], DecodeLimits::UNLIMITED).unwrap();
        assert_eq!(image.pixel(2, 1).unwrap(), &[77, 1, 2]);
        let _ = std::fs::remove_file(input);
        let _ = std::fs::remove_file(output);
    }

    #[test]
    fn test_swap_channels_reports_decoder_code() {
        let input = scratch("bad.tga");
        let mut header = vec![0u8; 18];
        header[1] = 1;
        std::fs::write(&input, &header).unwrap();
        let failure = run_swap(&SwapArgs {
            input: Some(input.clone()),
            output: Some(scratch("bad-out.tga")),
        })
        .unwrap_err();
        assert_eq!(failure.code, 5);
        let _ = std::fs::remove_file(input);
    }

    #[test]
    fn test_swap_channels_unwritable_output_is_write_error() {
        let input = scratch("swap-unwritable.tga");
        write_image(&input, 2, 2);
        let failure = run_swap(&SwapArgs {
            input: Some(input.clone()),
            output: Some(scratch("missing-dir").join("out.tga")),
        })
        .unwrap_err();
        assert_eq!(failure.code, EXIT_WRITE);
        let _ = std::fs::remove_file(input);
    }
}
