use clap::{Parser, Subcommand};
use dfxm_cli::{parse_background, parse_connectivity, parse_kind, parse_threshold, BackgroundMethod};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use dfxm_core::diagnostics::{map_stats, MemoryMonitor};
use dfxm_core::moments::{MomentEngine, MomentKind, MomentOptions};
use dfxm_core::segmentation::{segment_volume, SegmentationOptions};
use dfxm_core::validate::{validate_stack, ValidateOptions};
use dfxm_core::ImageStack;

#[derive(Parser)]
#[command(name = "dfxm")]
#[command(version, about = "Moment-map analysis for dark-field X-ray microscopy scans", long_about = None)]
struct Cli {
    /// Print debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and export moment maps for one dataset
    Moments {
        /// Dataset directory (TIFF frames + scan.yml)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output directory for map TIFFs and maps.yml
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Use GPU acceleration if available
        #[arg(long)]
        gpu: bool,

        /// Skip the 3x3 median smoothing of finished maps
        #[arg(long)]
        no_smooth: bool,

        /// Background subtraction method: "median" (default) or "none"
        #[arg(long, value_name = "METHOD", default_value = "median")]
        background: String,

        /// Zero out intensities outside this range
        #[arg(long, value_name = "BOTTOM,TOP")]
        threshold: Option<String>,

        /// Rows per band for the chunked implementation
        #[arg(long, value_name = "N")]
        chunk_rows: Option<usize>,
    },

    /// Process multiple dataset directories in parallel
    Batch {
        /// Dataset directories
        #[arg(value_name = "INPUTS")]
        inputs: Vec<PathBuf>,

        /// Output directory (one subdirectory per dataset)
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,

        /// Number of parallel threads
        #[arg(short = 'j', long, value_name = "N")]
        threads: Option<usize>,

        /// Skip the 3x3 median smoothing of finished maps
        #[arg(long)]
        no_smooth: bool,

        /// Background subtraction method: "median" (default) or "none"
        #[arg(long, value_name = "METHOD", default_value = "median")]
        background: String,

        /// Zero out intensities outside this range
        #[arg(long, value_name = "BOTTOM,TOP")]
        threshold: Option<String>,
    },

    /// Cross-validate the chunked implementation against the reference
    Validate {
        /// Dataset directory
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Relative tolerance
        #[arg(long, value_name = "X")]
        rtol: Option<f64>,

        /// Absolute tolerance
        #[arg(long, value_name = "X")]
        atol: Option<f64>,

        /// Validate the GPU path instead of the chunked CPU path
        #[arg(long)]
        gpu: bool,

        /// Write the full report as JSON
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Rows per band for the chunked implementation
        #[arg(long, value_name = "N")]
        chunk_rows: Option<usize>,
    },

    /// Build a volume from exported maps and segment it
    Segment {
        /// maps.yml manifests, one per slice, in depth order
        #[arg(value_name = "MANIFESTS")]
        manifests: Vec<PathBuf>,

        /// Scan dimension (motor) name
        #[arg(short, long, value_name = "NAME")]
        dimension: String,

        /// Moment kind: com, fwhm, skewness or kurtosis
        #[arg(short, long, value_name = "KIND")]
        kind: String,

        /// Number of intensity bins
        #[arg(long, value_name = "N")]
        bins: Option<usize>,

        /// Largest components kept per bin
        #[arg(long, value_name = "N")]
        components: Option<usize>,

        /// Ball radius of the binary closing
        #[arg(long, value_name = "R")]
        closing_radius: Option<usize>,

        /// Neighbor connectivity: 6, 18 or 26
        #[arg(long, value_name = "N")]
        connectivity: Option<usize>,

        /// Render overlay frames per bin into this directory
        #[arg(long, value_name = "DIR")]
        render: Option<PathBuf>,
    },

    /// Render volume frames to PNG files
    Render {
        /// maps.yml manifests, one per slice, in depth order
        #[arg(value_name = "MANIFESTS")]
        manifests: Vec<PathBuf>,

        /// Scan dimension (motor) name
        #[arg(short, long, value_name = "NAME")]
        dimension: String,

        /// Moment kind: com, fwhm, skewness or kurtosis
        #[arg(short, long, value_name = "KIND")]
        kind: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    dfxm_core::config::set_verbose(cli.verbose);

    let result = match cli.command {
        Commands::Moments {
            input,
            out,
            gpu,
            no_smooth,
            background,
            threshold,
            chunk_rows,
        } => cmd_moments(input, out, gpu, no_smooth, background, threshold, chunk_rows),

        Commands::Batch {
            inputs,
            out,
            threads,
            no_smooth,
            background,
            threshold,
        } => cmd_batch(inputs, out, threads, no_smooth, background, threshold),

        Commands::Validate {
            input,
            rtol,
            atol,
            gpu,
            json,
            chunk_rows,
        } => cmd_validate(input, rtol, atol, gpu, json, chunk_rows),

        Commands::Segment {
            manifests,
            dimension,
            kind,
            bins,
            components,
            closing_radius,
            connectivity,
            render,
        } => cmd_segment(
            manifests,
            dimension,
            kind,
            bins,
            components,
            closing_radius,
            connectivity,
            render,
        ),

        Commands::Render {
            manifests,
            dimension,
            kind,
            out,
        } => cmd_render(manifests, dimension, kind, out),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load one dataset and apply the requested preprocessing.
fn load_and_preprocess(
    input: &PathBuf,
    background: &str,
    threshold: &Option<String>,
) -> Result<ImageStack, String> {
    let background = parse_background(background)?;
    let threshold = match threshold {
        Some(t) => parse_threshold(t)?,
        None => (None, None),
    };

    let mut stack = dfxm_core::loaders::load_dataset(input)?;

    if background == BackgroundMethod::Median {
        dfxm_core::preprocess::subtract_median_background(&mut stack);
    }
    if threshold.0.is_some() || threshold.1.is_some() {
        dfxm_core::preprocess::remove_thresholds(&mut stack, threshold.0, threshold.1);
    }

    Ok(stack)
}

/// Moment options from flags, falling back to the loaded config.
fn build_moment_options(gpu: bool, no_smooth: bool, chunk_rows: Option<usize>) -> MomentOptions {
    let defaults = &dfxm_core::config::analysis_config_handle().config.defaults;
    MomentOptions {
        engine: if gpu {
            MomentEngine::Gpu
        } else {
            MomentEngine::Chunked
        },
        smooth: !no_smooth && defaults.smooth_maps,
        chunk_rows: chunk_rows.unwrap_or(defaults.chunk_rows),
    }
}

fn cmd_moments(
    input: PathBuf,
    out: PathBuf,
    gpu: bool,
    no_smooth: bool,
    background: String,
    threshold: Option<String>,
    chunk_rows: Option<usize>,
) -> Result<(), String> {
    dfxm_core::config::log_config_usage();

    println!("Analyzing {}...", input.display());
    let monitor = MemoryMonitor::start();

    let name = dfxm_core::loaders::dataset_name(&input)?;
    let stack = load_and_preprocess(&input, &background, &threshold)?;
    println!(
        "  Stack: {} frames of {}x{}, {} scan dimension(s)",
        stack.frames,
        stack.height,
        stack.width,
        stack.dimensions.len()
    );

    let options = build_moment_options(gpu, no_smooth, chunk_rows);
    let maps = dfxm_core::moments::moment_maps(&stack, &options)?;

    for map_set in &maps {
        println!("  Dimension '{}':", map_set.dimension);
        for kind in MomentKind::all() {
            let stats = map_stats(map_set.map(kind));
            println!(
                "    {:<14} min {:>12.5} max {:>12.5} mean {:>12.5} ({} NaN)",
                kind.label(),
                stats.min,
                stats.max,
                stats.mean,
                stats.nan_count
            );
        }
    }

    let manifest = dfxm_core::exporters::export_maps(&out, &name, &maps)?;
    println!("Maps exported to {}", manifest.display());

    if let Some(peak_kb) = monitor.stop() {
        dfxm_core::verbose_println!("[DEBUG] Peak memory: {:.1} MB", peak_kb as f64 / 1024.0);
    }

    Ok(())
}

fn cmd_batch(
    inputs: Vec<PathBuf>,
    out: PathBuf,
    threads: Option<usize>,
    no_smooth: bool,
    background: String,
    threshold: Option<String>,
) -> Result<(), String> {
    dfxm_core::config::log_config_usage();

    if inputs.is_empty() {
        return Err("No input datasets specified".to_string());
    }

    if let Some(num_threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| format!("Failed to configure thread pool: {}", e))?;
        println!("Using {} threads for parallel processing", num_threads);
    }

    std::fs::create_dir_all(&out)
        .map_err(|e| format!("Failed to create output directory: {}", e))?;

    println!("\nProcessing {} datasets in parallel...\n", inputs.len());

    let options = build_moment_options(false, no_smooth, None);
    let processed_count = AtomicUsize::new(0);
    let total = inputs.len();

    let results: Vec<Result<PathBuf, String>> = inputs
        .par_iter()
        .map(|input| {
            let name = dfxm_core::loaders::dataset_name(input)?;
            let stack = load_and_preprocess(input, &background, &threshold)?;
            let maps = dfxm_core::moments::moment_maps(&stack, &options)?;
            let manifest = dfxm_core::exporters::export_maps(&out.join(&name), &name, &maps)?;

            let count = processed_count.fetch_add(1, Ordering::SeqCst) + 1;
            println!(
                "[{}/{}] Processed: {} -> {}",
                count,
                total,
                input.display(),
                manifest.display()
            );

            Ok(manifest)
        })
        .collect();

    let mut success_count = 0;
    let mut errors: Vec<(PathBuf, String)> = Vec::new();
    for (input, result) in inputs.iter().zip(results.iter()) {
        match result {
            Ok(_) => success_count += 1,
            Err(e) => errors.push((input.clone(), e.clone())),
        }
    }

    println!("\n========================================");
    println!("BATCH PROCESSING COMPLETE");
    println!("========================================");
    println!("  Successful: {}", success_count);
    println!("  Failed:     {}", errors.len());
    println!("  Output dir: {}", out.display());

    if !errors.is_empty() {
        println!("\nErrors:");
        for (path, error) in &errors {
            println!("  {}: {}", path.display(), error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("{} datasets failed to process", errors.len()))
    }
}

fn cmd_validate(
    input: PathBuf,
    rtol: Option<f64>,
    atol: Option<f64>,
    gpu: bool,
    json: Option<PathBuf>,
    chunk_rows: Option<usize>,
) -> Result<(), String> {
    dfxm_core::config::log_config_usage();
    let defaults = &dfxm_core::config::analysis_config_handle().config.defaults;

    println!("Validating implementations on {}...", input.display());

    let stack = dfxm_core::loaders::load_dataset(&input)?;
    let options = ValidateOptions {
        engine: if gpu {
            MomentEngine::Gpu
        } else {
            MomentEngine::Chunked
        },
        rtol: rtol.unwrap_or(defaults.validate_rtol),
        atol: atol.unwrap_or(defaults.validate_atol),
        chunk_rows: chunk_rows.unwrap_or(defaults.chunk_rows),
    };

    let report = validate_stack(&stack, &options)?;

    println!(
        "  Tolerances: rtol {:e}, atol {:e} over {} pixels",
        report.rtol, report.atol, report.pixels
    );
    for dimension in &report.dimensions {
        println!("  Dimension '{}':", dimension.dimension);
        for map in &dimension.maps {
            println!(
                "    {:<10} {:>8} mismatches, max |diff| {:e}",
                map.kind, map.mismatches, map.max_abs_diff
            );
        }
    }

    if let Some(json_path) = json {
        let text = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        std::fs::write(&json_path, text)
            .map_err(|e| format!("Failed to write {}: {}", json_path.display(), e))?;
        println!("Report written to {}", json_path.display());
    }

    if report.passed() {
        println!("PASS: implementations agree within tolerance");
        Ok(())
    } else {
        Err(format!(
            "{} pixels differ beyond tolerance",
            report.total_mismatches()
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_segment(
    manifests: Vec<PathBuf>,
    dimension: String,
    kind: String,
    bins: Option<usize>,
    components: Option<usize>,
    closing_radius: Option<usize>,
    connectivity: Option<usize>,
    render: Option<PathBuf>,
) -> Result<(), String> {
    dfxm_core::config::log_config_usage();
    let defaults = &dfxm_core::config::analysis_config_handle().config.defaults;

    let kind = parse_kind(&kind)?;
    let options = SegmentationOptions {
        bins: bins.unwrap_or(defaults.segmentation_bins),
        components: components.unwrap_or(defaults.segmentation_components),
        closing_radius: closing_radius.unwrap_or(defaults.closing_radius),
        connectivity: parse_connectivity(connectivity.unwrap_or(defaults.connectivity))?,
    };

    println!(
        "Assembling {} slice(s) of '{}' {}...",
        manifests.len(),
        dimension,
        kind.label()
    );
    let volume = dfxm_core::assemble_volume(&manifests, &dimension, kind)?;
    let stats = volume.stats();
    println!(
        "  Volume: {}x{}x{}, range {:.5}..{:.5} ({} NaN voxels)",
        volume.depth, volume.height, volume.width, stats.min, stats.max, stats.nan_count
    );

    let segmentations = segment_volume(&volume, &options)?;

    for seg in &segmentations {
        let labeled = seg.labels.iter().filter(|&&l| l > 0).count();
        println!(
            "  Bin {} [{:.5}, {:.5}): {} component(s), {} labeled voxels",
            seg.bin, seg.lower, seg.upper, seg.component_count, labeled
        );
    }

    if let Some(render_dir) = render {
        for seg in &segmentations {
            let bin_dir = render_dir.join(format!("bin_{:02}", seg.bin));
            let frames = dfxm_core::render::render_volume(&volume, Some(seg.labels.as_slice()), &bin_dir)?;
            println!(
                "  Bin {}: {} overlay frame(s) -> {}",
                seg.bin,
                frames.len(),
                bin_dir.display()
            );
        }
    }

    Ok(())
}

fn cmd_render(
    manifests: Vec<PathBuf>,
    dimension: String,
    kind: String,
    out: PathBuf,
) -> Result<(), String> {
    dfxm_core::config::log_config_usage();

    let kind = parse_kind(&kind)?;
    let volume = dfxm_core::assemble_volume(&manifests, &dimension, kind)?;
    let frames = dfxm_core::render::render_volume(&volume, None, &out)?;

    println!(
        "Rendered {} frame(s) of '{}' {} to {}",
        frames.len(),
        dimension,
        kind.label(),
        out.display()
    );
    Ok(())
}
