use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// Lossless PNG crops
    #[value(name = "png")]
    Png,
    /// JPEG crops
    #[value(name = "jpg")]
    Jpg,
}

impl OutputType {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputType::Png => "png",
            OutputType::Jpg => "jpg",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DetectorKind {
    /// Read precomputed detections from `<image>.faces.json`
    #[value(name = "sidecar")]
    Sidecar,
    /// Run an external detector script for every image
    #[value(name = "script")]
    Script,
}

#[derive(Parser, Debug)]
#[command(
    name = "facecrop-processor",
    about = "Crop detected faces into fixed-size square thumbnails",
    long_about = "
Face Crop Processor

Turns face detections into square, margin-padded crops resized to 512x512,
ready for recognition models or thumbnail galleries. Detections come from a
JSON sidecar next to each image or from an external detector script.

Example Usage:
  # Crop faces using <image>.faces.json sidecars
  facecrop-processor -i ~/Photos -o ~/faces

  # Run a detector script and keep only very confident faces
  facecrop-processor -i ~/Photos -o ~/faces --detector script \\
    --detector-script ./scripts/detect_faces.py --confidence 0.99

  # Tighter crops as JPEG, with debug overlays
  facecrop-processor -i ~/Photos/IMG_001.jpg -o ~/faces --margin 1.2 \\
    --output-format jpg --debug

  # Dry run: print the regions that would be cropped
  facecrop-processor -i ~/Photos -o ~/faces --dry-run --report"
)]
pub struct Args {
    /// Input directories or single image files (can be specified multiple times)
    #[arg(
        short = 'i',
        long = "input",
        required_unless_present = "config_file",
        value_name = "DIR|FILE"
    )]
    pub input_paths: Vec<PathBuf>,

    /// Output directory for face crops
    #[arg(short = 'o', long = "output", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Expansion factor applied to the squared face box (1.0-8.0)
    #[arg(long = "margin", default_value = "1.6", value_name = "FACTOR")]
    pub margin: f32,

    /// Minimum detector confidence (0.0-1.0)
    #[arg(long = "confidence", default_value = "0.97", value_name = "THRESHOLD")]
    pub confidence_threshold: f32,

    /// Maximum number of faces cropped per image
    #[arg(long = "max-faces", default_value = "20", value_name = "N")]
    pub max_faces: usize,

    /// Where detections come from
    #[arg(long = "detector", default_value = "sidecar")]
    pub detector: DetectorKind,

    /// Detector executable or Python script (required with --detector script)
    #[arg(long = "detector-script", value_name = "FILE")]
    pub detector_script: Option<PathBuf>,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = DEFAULT_EXTENSIONS)]
    pub extensions_str: String,

    /// Image format of the crops
    #[arg(long = "output-format", default_value = "png")]
    pub output_format: OutputType,

    /// Number of parallel processing jobs (0 = auto-detect CPU cores)
    #[arg(short = 'j', long = "jobs", default_value = "0", value_name = "N")]
    pub jobs: usize,

    /// Enable verbose output with detailed progress information
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Write <stem>_debug.png with detector, squared and final boxes
    #[arg(long = "debug")]
    pub debug: bool,

    /// Display a table of every cropped region at the end
    #[arg(long = "report")]
    pub report: bool,

    /// Compute regions without writing any files
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Re-process images whose crops already exist
    #[arg(long = "force")]
    pub force: bool,

    /// Emit machine-readable JSON lines instead of progress bars
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Load defaults from a JSON configuration file
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

pub const DEFAULT_EXTENSIONS: &str = "jpg,jpeg,png,webp,tiff";

impl Args {
    /// Parse the extensions string into a vector
    pub fn parse_extensions(&self) -> Vec<String> {
        self.extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Worker threads to use, resolving 0 to the CPU count
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}


// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input_paths: vec![],
            output_dir: PathBuf::new(),
            margin: 1.6,
            confidence_threshold: 0.97,
            max_faces: 20,
            detector: DetectorKind::Sidecar,
            detector_script: None,
            extensions_str: DEFAULT_EXTENSIONS.to_string(),
            output_format: OutputType::Png,
            jobs: 0,
            verbose: false,
            debug: false,
            report: false,
            dry_run: false,
            force: false,
            json_progress: false,
            config_file: None,
        }
    }
}
