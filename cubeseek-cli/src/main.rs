//! Command-line front end for the cubeseek source finder.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;

use cubeseek_algorithms::{ScaleNoiseConfig, ScaleNoiseMode};
use cubeseek_core::{FlagShape, FluxRange, NoiseStatistic, Region, ValueList};
use cubeseek_pipeline::Params;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    CubeseekIo(#[from] cubeseek_io::Error),

    #[error("{0}")]
    Core(#[from] cubeseek_core::Error),

    #[error("{0}")]
    Pipeline(#[from] cubeseek_pipeline::Error),

    #[error("invalid argument: {0}")]
    Argument(String),
}

/// Noise measurement statistic selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Statistic {
    /// Standard deviation about zero.
    Std,
    /// Median absolute deviation.
    Mad,
    /// Gaussian fit to the flux histogram.
    Gauss,
}

impl From<Statistic> for NoiseStatistic {
    fn from(statistic: Statistic) -> Self {
        match statistic {
            Statistic::Std => Self::Std,
            Statistic::Mad => Self::Mad,
            Statistic::Gauss => Self::Gauss,
        }
    }
}

/// Flux range selection for noise measurements.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Range {
    /// Negative fluxes only.
    Negative,
    /// The full flux range.
    Full,
    /// Positive fluxes only.
    Positive,
}

impl From<Range> for FluxRange {
    fn from(range: Range) -> Self {
        match range {
            Range::Negative => Self::Negative,
            Range::Full => Self::Full,
            Range::Positive => Self::Positive,
        }
    }
}

/// Noise scaling mode selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScalingMode {
    /// No noise scaling.
    None,
    /// One noise value per spectral channel.
    Global,
    /// Noise measured in local windows.
    Local,
}

/// Source finder for 3-D spectral-line data cubes.
#[derive(Parser)]
#[command(name = "cubeseek")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find sources in a data cube
    Process {
        /// Input FITS cube
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base name for output files (defaults to the input file stem)
        #[arg(long)]
        name: Option<String>,

        /// Sub-cube region "x1,x2,y1,y2,z1,z2"
        #[arg(long)]
        region: Option<String>,

        /// Weights cube the data are divided by
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Flagging shapes, e.g. "pixel:3,4" or "region:0,9,0,9,0,9"
        #[arg(long = "flag")]
        flags: Vec<String>,

        /// Spatial kernel FWHMs in pixels
        #[arg(long, default_value = "0,3,6")]
        kernels_xy: String,

        /// Spectral boxcar widths in channels (odd or 0)
        #[arg(long, default_value = "0,3,7,15")]
        kernels_z: String,

        /// Detection threshold in multiples of the noise
        #[arg(short, long, default_value = "5.0")]
        threshold: f64,

        /// Replacement factor for already-detected pixels
        #[arg(long, default_value = "2.0")]
        replacement: f64,

        /// Noise measurement statistic
        #[arg(long, value_enum, default_value = "std")]
        statistic: Statistic,

        /// Flux range entering noise measurements
        #[arg(long, value_enum, default_value = "negative")]
        flux_range: Range,

        /// Noise scaling mode
        #[arg(long, value_enum, default_value = "none")]
        scale_noise: ScalingMode,

        /// Spatial window for local noise scaling (pixels)
        #[arg(long, default_value = "25")]
        window_xy: usize,

        /// Spectral window for local noise scaling (channels)
        #[arg(long, default_value = "15")]
        window_z: usize,

        /// Spatial grid for local noise scaling (0 = half window)
        #[arg(long, default_value = "0")]
        grid_xy: usize,

        /// Spectral grid for local noise scaling (0 = half window)
        #[arg(long, default_value = "0")]
        grid_z: usize,

        /// Interpolate local noise values between grid points
        #[arg(long)]
        interpolate: bool,

        /// Linker merging radii
        #[arg(long, default_value = "1,1,1")]
        radius: String,

        /// Minimum source extents
        #[arg(long, default_value = "5,5,5")]
        min_size: String,

        /// Keep sources with negative total flux
        #[arg(long)]
        keep_negative: bool,

        /// Write the filtered cube
        #[arg(long)]
        write_filtered: bool,

        /// Write the local noise cube
        #[arg(long)]
        write_noise: bool,

        /// Skip writing the mask cube
        #[arg(long)]
        no_mask: bool,

        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
    },

    /// Show structural information about a FITS cube
    Info {
        /// Input FITS cube
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        command @ Commands::Process { .. } => process(command),
        Commands::Info { input } => info(&input),
    }
}

fn parse_triple(text: &str, what: &str) -> Result<(usize, usize, usize)> {
    let list = ValueList::parse_int(text)
        .map_err(|e| CliError::Argument(format!("{what}: {e}")))?;
    if list.len() != 3 {
        return Err(CliError::Argument(format!(
            "{what}: expected 3 values, found {}",
            list.len()
        )));
    }
    let value = |i: usize| -> Result<usize> {
        let v = list.get_int(i);
        usize::try_from(v).map_err(|_| CliError::Argument(format!("{what}: negative value {v}")))
    };
    Ok((value(0)?, value(1)?, value(2)?))
}

fn process(command: Commands) -> Result<()> {
    let Commands::Process {
        input,
        output,
        name,
        region,
        weights,
        flags,
        kernels_xy,
        kernels_z,
        threshold,
        replacement,
        statistic,
        flux_range,
        scale_noise,
        window_xy,
        window_z,
        grid_xy,
        grid_z,
        interpolate,
        radius,
        min_size,
        keep_negative,
        write_filtered,
        write_noise,
        no_mask,
        overwrite,
    } = command
    else {
        unreachable!();
    };

    let mut params = Params::new(input);
    params.output.directory = output;
    params.output.base_name = name;
    params.output.write_filtered = write_filtered;
    params.output.write_noise = write_noise;
    params.output.write_mask = !no_mask;
    params.output.overwrite = overwrite;

    if let Some(region) = region {
        params.input.region = Some(Region::parse(&region).map_err(cubeseek_core::Error::from)?);
    }
    params.input.weights = weights;
    for flag in &flags {
        let shape = FlagShape::parse(flag).map_err(cubeseek_core::Error::from)?;
        params.input.flags.push(shape);
    }

    let spatial = ValueList::parse_flt(&kernels_xy).map_err(cubeseek_core::Error::from)?;
    let spectral = ValueList::parse_int(&kernels_z).map_err(cubeseek_core::Error::from)?;
    params.scfind.kernels_xy = (0..spatial.len()).map(|i| spatial.get_flt(i)).collect();
    params.scfind.kernels_z = (0..spectral.len())
        .map(|i| {
            let width = spectral.get_int(i);
            usize::try_from(width)
                .map_err(|_| CliError::Argument(format!("negative spectral kernel {width}")))
        })
        .collect::<Result<_>>()?;
    params.scfind.threshold = threshold;
    params.scfind.replacement = replacement;
    params.scfind.statistic = statistic.into();
    params.scfind.flux_range = flux_range.into();

    params.scale_noise = match scale_noise {
        ScalingMode::None => None,
        mode => Some(ScaleNoiseConfig {
            mode: match mode {
                ScalingMode::Global => ScaleNoiseMode::Global,
                _ => ScaleNoiseMode::Local,
            },
            statistic: statistic.into(),
            flux_range: flux_range.into(),
            window_xy,
            window_z,
            grid_xy,
            grid_z,
            interpolate,
        }),
    };

    let (rx, ry, rz) = parse_triple(&radius, "radius")?;
    let (mx, my, mz) = parse_triple(&min_size, "min-size")?;
    params.linker = params
        .linker
        .with_radius(rx, ry, rz)
        .with_min_size(mx, my, mz)
        .with_remove_negative(!keep_negative);

    let output = cubeseek_pipeline::run(&params)?;

    if output.sources.source_count() == 0 {
        println!("No sources found.");
        return Ok(());
    }

    println!("{:>5} {:>8} {:>12} {:>23}", "label", "pixels", "flux", "bounding box");
    for row in 0..output.sources.source_count() {
        let (x0, x1, y0, y1, z0, z1) = output.sources.bounding_box(row);
        println!(
            "{:>5} {:>8} {:>12.4e} {:>23}",
            output.sources.get_label(row),
            output.sources.n_pix(row),
            output.sources.f_sum(row),
            format!("[{x0}-{x1}, {y0}-{y1}, {z0}-{z1}]")
        );
    }
    Ok(())
}

fn info(input: &PathBuf) -> Result<()> {
    let cube = cubeseek_io::load_cube(input, None)?;
    let [nx, ny, nz] = cube.axis_size();

    println!("File:       {}", input.display());
    println!("Data type:  {}", cube.bitpix());
    println!("Axes:       {} ({nx} x {ny} x {nz})", cube.dimension());
    println!(
        "Memory:     {:.1} MB",
        (cube.data_size() * cube.word_size()) as f64 / 1048576.0
    );
    if let Ok(unit) = cube.header().get_str("BUNIT") {
        println!("Flux unit:  {unit}");
    }
    for axis in 1..=cube.dimension() {
        let ctype = cube
            .header()
            .get_str(&format!("CTYPE{axis}"))
            .unwrap_or_else(|_| String::from("?"));
        let crval = cube.header().get_flt(&format!("CRVAL{axis}"));
        let cdelt = cube.header().get_flt(&format!("CDELT{axis}"));
        println!("Axis {axis}:     {ctype} (CRVAL = {crval}, CDELT = {cdelt})");
    }
    Ok(())
}
