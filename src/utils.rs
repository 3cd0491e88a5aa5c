use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, DetectorKind};

pub const MAX_JOBS: usize = 32;
pub const MIN_MARGIN: f32 = 1.0;
pub const MAX_MARGIN: f32 = 8.0;

/// Install the tracing subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("facecrop_processor={}", default_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Create a styled progress bar
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.blue} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg} ({eta})",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs >= 60 {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        format!("{}m {}s", mins, secs)
    } else if total_secs > 0 {
        format!("{}.{:03}s", total_secs, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Validate command line arguments
pub fn validate_inputs(args: &Args) -> Result<()> {
    if args.input_paths.is_empty() {
        return Err(anyhow::anyhow!("No input paths specified"));
    }

    // Validate input paths (directories or files)
    for input_path in &args.input_paths {
        if !input_path.exists() {
            return Err(anyhow::anyhow!(
                "Input path does not exist: {}",
                input_path.display()
            ));
        }
        if !input_path.is_dir() && !input_path.is_file() {
            return Err(anyhow::anyhow!(
                "Input path is neither a file nor a directory: {}",
                input_path.display()
            ));
        }
    }

    if args.output_dir.is_file() {
        return Err(anyhow::anyhow!(
            "Output path is a file: {}",
            args.output_dir.display()
        ));
    }

    if args.parse_extensions().is_empty() {
        return Err(anyhow::anyhow!("No valid extensions specified"));
    }

    if !(MIN_MARGIN..=MAX_MARGIN).contains(&args.margin) {
        return Err(anyhow::anyhow!(
            "Margin must be between {} and {}, got: {}",
            MIN_MARGIN,
            MAX_MARGIN,
            args.margin
        ));
    }

    if !(0.0..=1.0).contains(&args.confidence_threshold) {
        return Err(anyhow::anyhow!(
            "Confidence threshold must be between 0.0 and 1.0, got: {}",
            args.confidence_threshold
        ));
    }

    if args.max_faces == 0 {
        return Err(anyhow::anyhow!("--max-faces must be at least 1"));
    }

    if args.jobs > MAX_JOBS {
        return Err(anyhow::anyhow!(
            "Job count too high (max {}), got: {}",
            MAX_JOBS,
            args.jobs
        ));
    }

    if args.detector == DetectorKind::Script {
        match &args.detector_script {
            None => {
                return Err(anyhow::anyhow!(
                    "--detector script requires --detector-script <FILE>"
                ))
            }
            Some(script) if !script.is_file() => {
                return Err(anyhow::anyhow!(
                    "Detector script not found: {}",
                    script.display()
                ))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

/// Get file extension in lowercase
pub fn get_file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Check if a file has one of the specified extensions
pub fn has_valid_extension(path: &Path, extensions: &[String]) -> bool {
    if let Some(ext) = get_file_extension(path) {
        extensions.contains(&ext)
    } else {
        false
    }
}

/// Generate a safe filename by replacing characters most filesystems reject
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `<stem>_<suffix>.<ext>` for an input file
pub fn create_output_filename(input_path: &Path, suffix: Option<&str>, extension: &str) -> String {
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(sanitize_filename)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "image".to_string());

    match suffix {
        Some(suffix) => format!("{}_{}.{}", stem, suffix, extension),
        None => format!("{}.{}", stem, extension),
    }
}
