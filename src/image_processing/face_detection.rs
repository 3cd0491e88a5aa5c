use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::face_region::RawBox;
use crate::error::FaceRegionError;

/// One face reported by a detector.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub raw_box: RawBox,
    pub confidence: f32,
    /// Eyes, nose and mouth corners when the detector provides them.
    pub landmarks: Option<Vec<[f32; 2]>>,
}

/// Pluggable face detection backend.
///
/// `image` is the decoded, orientation-corrected image; `source` is the file
/// it came from. Boxes must be in `image` coordinates.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, source: &Path, image: &RgbImage) -> Result<Vec<Detection>>;

    fn name(&self) -> &'static str;
}

/// JSON document produced by detector scripts and sidecar files
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FacesDocument {
    #[serde(default)]
    pub faces: Vec<FaceEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FaceEntry {
    /// `[left, top, right, bottom, ...]`
    #[serde(rename = "box")]
    pub bounding_box: Vec<f32>,
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default)]
    pub landmarks: Option<Vec<[f32; 2]>>,
}

fn default_confidence() -> f32 {
    1.0
}

impl FacesDocument {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse face detection JSON")
    }

    /// Convert entries to detections, failing on the first malformed box
    pub fn into_detections(self) -> Result<Vec<Detection>> {
        if let Some(error) = self.error {
            return Err(anyhow::anyhow!("Detector reported an error: {}", error));
        }

        self.faces
            .into_iter()
            .map(|entry| {
                let raw_box = RawBox::from_slice(&entry.bounding_box)?;
                Ok(Detection {
                    raw_box,
                    confidence: entry.confidence,
                    landmarks: entry.landmarks,
                })
            })
            .collect::<Result<Vec<_>, FaceRegionError>>()
            .map_err(Into::into)
    }
}

/// Keep detections at or above `confidence_threshold`, most confident
/// first, at most `max_faces` of them.
pub fn select_faces(
    mut detections: Vec<Detection>,
    confidence_threshold: f32,
    max_faces: usize,
) -> Vec<Detection> {
    detections.retain(|d| d.confidence >= confidence_threshold);
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    detections.truncate(max_faces);
    detections
}

/// Detector that shells out to an external program.
///
/// The program is invoked as `<program> --image <file> --output-format json`
/// and must print a [`FacesDocument`] on stdout.
pub struct ScriptDetector {
    program: PathBuf,
    interpreter: Option<String>,
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl ScriptDetector {
    pub fn new(program: &Path) -> Result<Self> {
        if !program.exists() {
            return Err(anyhow::anyhow!(
                "Detector script not found: {}",
                program.display()
            ));
        }

        // Python scripts are rarely executable on their own
        let interpreter = match program.extension().and_then(|e| e.to_str()) {
            Some("py") => Some("python3".to_string()),
            _ => None,
        };

        Ok(Self {
            program: program.to_path_buf(),
            interpreter,
        })
    }

    fn command(&self) -> Command {
        match &self.interpreter {
            Some(interpreter) => {
                let mut cmd = Command::new(interpreter);
                cmd.arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        }
    }

    /// Write the oriented image where the script can read it
    fn save_temp_image(&self, image: &RgbImage) -> Result<PathBuf> {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = std::env::temp_dir().join(format!(
            "facecrop_input_{}_{}.png",
            std::process::id(),
            n
        ));

        image
            .save(&temp_path)
            .with_context(|| format!("Failed to write temp image: {}", temp_path.display()))?;

        Ok(temp_path)
    }
}

impl FaceDetector for ScriptDetector {
    fn detect(&self, source: &Path, image: &RgbImage) -> Result<Vec<Detection>> {
        let temp_path = self.save_temp_image(image)?;

        debug!(
            "Running detector {} for {}",
            self.program.display(),
            source.display()
        );

        let output = self
            .command()
            .arg("--image")
            .arg(&temp_path)
            .arg("--output-format")
            .arg("json")
            .output();

        let _ = std::fs::remove_file(&temp_path);

        let output = output
            .with_context(|| format!("Failed to execute detector: {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow::anyhow!(
                "Detector failed on {}: {}",
                source.display(),
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        FacesDocument::parse(&stdout)
            .with_context(|| format!("Raw detector output: {}", stdout.trim()))?
            .into_detections()
    }

    fn name(&self) -> &'static str {
        "script"
    }
}

/// Detector that reads precomputed detections from `<image>.faces.json`.
#[derive(Debug, Default)]
pub struct SidecarDetector;

impl SidecarDetector {
    pub fn sidecar_path(source: &Path) -> PathBuf {
        let mut name = source.as_os_str().to_os_string();
        name.push(".faces.json");
        PathBuf::from(name)
    }
}

impl FaceDetector for SidecarDetector {
    fn detect(&self, source: &Path, _image: &RgbImage) -> Result<Vec<Detection>> {
        let sidecar = Self::sidecar_path(source);
        if !sidecar.exists() {
            debug!("No sidecar for {}", source.display());
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read sidecar: {}", sidecar.display()))?;

        FacesDocument::parse(&contents)
            .with_context(|| format!("Invalid sidecar: {}", sidecar.display()))?
            .into_detections()
    }

    fn name(&self) -> &'static str {
        "sidecar"
    }
}
