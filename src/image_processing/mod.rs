pub mod annotate;
pub mod face_detection;
pub mod face_region;
pub mod orientation;
pub mod report;
pub mod resize;

use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cli::OutputType;
use crate::error::FaceRegionError;
use crate::utils::{create_output_filename, has_valid_extension};
use annotate::OverlayFace;
use face_detection::{select_faces, FaceDetector};
use face_region::{square_box, FaceBox, FaceRegion, RawBox};
use orientation::ExifOrientation;

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Multiplier applied to the squared face box; capped per image.
    pub margin: f32,
    pub confidence_threshold: f32,
    pub max_faces: usize,
    pub output_format: OutputType,
    pub extensions: Vec<String>,
    pub parallel_jobs: usize,
    pub debug: bool,
    pub dry_run: bool,
    pub force: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            margin: 1.6,
            confidence_threshold: 0.97,
            max_faces: 20,
            output_format: OutputType::Png,
            extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            parallel_jobs: num_cpus::get(),
            debug: false,
            dry_run: false,
            force: false,
        }
    }
}

/// One cropped (or, in dry-run mode, planned) face
#[derive(Debug, Clone)]
pub struct FaceCrop {
    /// Rank in confidence order, used in the output name
    pub index: usize,
    pub confidence: f32,
    pub raw_box: RawBox,
    pub region: FaceBox,
    /// `None` in dry-run mode
    pub output_path: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ProcessingResult {
    pub input_path: PathBuf,
    /// Width and height after orientation correction
    pub image_size: (u32, u32),
    pub orientation: ExifOrientation,
    /// Detections that passed the confidence and count filters
    pub detections: usize,
    pub faces: Vec<FaceCrop>,
    /// Detections whose box could not form a region
    pub rejected_faces: usize,
    pub debug_path: Option<PathBuf>,
    pub processing_time: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    OutputExists,
}

#[derive(Debug, Clone)]
pub struct SkippedResult {
    pub input_path: PathBuf,
    pub reason: SkipReason,
    pub existing_output_path: PathBuf,
}

#[derive(Debug)]
pub enum ImageOutcome {
    Processed(ProcessingResult),
    Skipped(SkippedResult),
}

/// Results of a batch, each list in input order
#[derive(Debug, Default)]
pub struct BatchResults {
    pub processed: Vec<ProcessingResult>,
    pub skipped: Vec<SkippedResult>,
    pub failed: Vec<(PathBuf, anyhow::Error)>,
}

impl BatchResults {
    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }

    pub fn faces_found(&self) -> usize {
        self.processed.iter().map(|r| r.faces.len()).sum()
    }
}

pub struct ProcessingEngine {
    config: ProcessingConfig,
    detector: Box<dyn FaceDetector>,
    pool: rayon::ThreadPool,
}

impl ProcessingEngine {
    pub fn new(config: ProcessingConfig, detector: Box<dyn FaceDetector>) -> Result<Self> {
        if !config.margin.is_finite() || config.margin < 1.0 {
            return Err(FaceRegionError::InvalidMargin {
                margin: config.margin,
            }
            .into());
        }

        debug!(
            "Using {} detector, {} worker threads",
            detector.name(),
            config.parallel_jobs.max(1)
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel_jobs.max(1))
            .build()
            .context("Failed to initialize thread pool")?;

        Ok(Self {
            config,
            detector,
            pool,
        })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Collect image files from directories and explicit file paths
    pub fn discover_images(&self, input_paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut image_files = Vec::new();

        for input_path in input_paths {
            if input_path.is_file() {
                if has_valid_extension(input_path, &self.config.extensions) {
                    image_files.push(input_path.clone());
                } else {
                    warn!("Skipping {}: unsupported extension", input_path.display());
                }
                continue;
            }

            debug!("Scanning directory: {}", input_path.display());

            let walker = WalkDir::new(input_path).follow_links(false).max_depth(10);

            for entry in walker {
                let entry = entry.context("Failed to read directory entry")?;
                let path = entry.path();

                if path.is_file() && has_valid_extension(path, &self.config.extensions) {
                    image_files.push(path.to_path_buf());
                }
            }
        }

        image_files.sort();
        image_files.dedup();

        info!("Found {} image files", image_files.len());
        Ok(image_files)
    }

    /// Process images in parallel; `progress` receives the completed count
    /// and the file that just finished.
    pub fn process_batch<F>(&self, image_files: &[PathBuf], output_dir: &Path, progress: F) -> BatchResults
    where
        F: Fn(usize, &Path) + Send + Sync,
    {
        let completed = AtomicUsize::new(0);

        let outcomes: Vec<(PathBuf, Result<ImageOutcome>)> = self.pool.install(|| {
            image_files
                .par_iter()
                .map(|image_path| {
                    let outcome = self.process_single_image(image_path, output_dir);

                    let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress(count, image_path);

                    (image_path.clone(), outcome)
                })
                .collect()
        });

        let mut results = BatchResults::default();
        for (path, outcome) in outcomes {
            match outcome {
                Ok(ImageOutcome::Processed(result)) => results.processed.push(result),
                Ok(ImageOutcome::Skipped(skipped)) => results.skipped.push(skipped),
                Err(e) => {
                    warn!("Failed to process {}: {:#}", path.display(), e);
                    results.failed.push((path, e));
                }
            }
        }

        results
    }

    /// Output path of the face with rank `index`
    pub fn output_path_for(&self, input_path: &Path, output_dir: &Path, index: usize) -> PathBuf {
        let suffix = format!("face{:02}", index);
        output_dir.join(create_output_filename(
            input_path,
            Some(&suffix),
            self.config.output_format.extension(),
        ))
    }

    /// First crop already written for `input_path`, if any.
    ///
    /// Any rank counts, since a rejected box leaves a gap in the numbering.
    pub fn existing_output(&self, input_path: &Path, output_dir: &Path) -> Option<PathBuf> {
        (0..self.config.max_faces.max(1))
            .map(|index| self.output_path_for(input_path, output_dir, index))
            .find(|path| path.exists())
    }

    fn debug_path_for(&self, input_path: &Path, output_dir: &Path) -> PathBuf {
        output_dir.join(create_output_filename(input_path, Some("debug"), "png"))
    }

    /// Detect, crop and save every selected face of one image
    pub fn process_single_image(&self, input_path: &Path, output_dir: &Path) -> Result<ImageOutcome> {
        let start = Instant::now();

        if !self.config.force && !self.config.dry_run {
            if let Some(existing) = self.existing_output(input_path, output_dir) {
                debug!("Skipping {}: {} exists", input_path.display(), existing.display());
                return Ok(ImageOutcome::Skipped(SkippedResult {
                    input_path: input_path.to_path_buf(),
                    reason: SkipReason::OutputExists,
                    existing_output_path: existing,
                }));
            }
        }

        debug!("Processing: {}", input_path.display());

        let img = image::open(input_path)
            .with_context(|| format!("Failed to open image: {}", input_path.display()))?
            .to_rgb8();

        let orientation = orientation::read_orientation(input_path);
        if orientation.needs_transform() {
            debug!(
                "Applying EXIF orientation to {}: {}",
                input_path.display(),
                orientation.description()
            );
        }
        let img = orientation::apply_rotation(img, orientation);
        let (width, height) = img.dimensions();

        let detections = self
            .detector
            .detect(input_path, &img)
            .with_context(|| format!("Face detection failed: {}", input_path.display()))?;
        let total_detections = detections.len();
        let selected = select_faces(
            detections,
            self.config.confidence_threshold,
            self.config.max_faces,
        );

        debug!(
            "{}: {} detections, {} selected",
            input_path.display(),
            total_detections,
            selected.len()
        );

        let mut faces = Vec::with_capacity(selected.len());
        let mut overlay = Vec::new();
        let mut rejected_faces = 0;

        for (index, detection) in selected.iter().enumerate() {
            let raw_box = detection.raw_box;

            let region = if self.config.dry_run {
                FaceRegion::bounds(width, height, &raw_box, self.config.margin).map(|b| (b, None))
            } else {
                FaceRegion::new(&img, &raw_box, self.config.margin).map(|r| (r.as_face_box(), Some(r)))
            };

            let (region_box, region) = match region {
                Ok(ok) => ok,
                Err(FaceRegionError::InvalidBox { reason }) => {
                    warn!(
                        "Skipping face #{} in {}: {}",
                        index,
                        input_path.display(),
                        reason
                    );
                    rejected_faces += 1;
                    overlay.push(OverlayFace {
                        raw_box,
                        squared: None,
                        region: None,
                    });
                    continue;
                }
                Err(e) => return Err(e).context(format!("Failed to crop {}", input_path.display())),
            };

            let output_path = match region {
                Some(region) => {
                    let path = self.output_path_for(input_path, output_dir, index);
                    region
                        .image
                        .save(&path)
                        .with_context(|| format!("Failed to save face crop: {}", path.display()))?;
                    Some(path)
                }
                None => None,
            };

            overlay.push(OverlayFace {
                raw_box,
                squared: square_box(&raw_box).ok(),
                region: Some(region_box),
            });

            faces.push(FaceCrop {
                index,
                confidence: detection.confidence,
                raw_box,
                region: region_box,
                output_path,
            });
        }

        let debug_path = if self.config.debug && !self.config.dry_run {
            let path = self.debug_path_for(input_path, output_dir);
            annotate::draw_debug_overlay(&img, &overlay)
                .save(&path)
                .with_context(|| format!("Failed to save debug image: {}", path.display()))?;
            Some(path)
        } else {
            None
        };

        Ok(ImageOutcome::Processed(ProcessingResult {
            input_path: input_path.to_path_buf(),
            image_size: (width, height),
            orientation,
            detections: selected.len(),
            faces,
            rejected_faces,
            debug_path,
            processing_time: start.elapsed(),
        }))
    }
}
