//! JSON output for tool integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::ProcessingResult;

/// Last progress emission timestamp (milliseconds since epoch)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

const PROGRESS_INTERVAL_MS: u64 = 40;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct JsonFace {
    pub index: usize,
    pub confidence: f32,
    /// `[left, top, right, bottom]` of the cropped region
    pub region: [i64; 4],
    pub output_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    /// File processing completed
    FileCompleted {
        input_path: String,
        faces: Vec<JsonFace>,
        rejected_faces: usize,
        processing_time_ms: u128,
    },
    /// File processing failed
    FileFailed { input_path: String, error: String },
    /// Processing summary
    Summary {
        total_files: usize,
        processed: usize,
        skipped: usize,
        failed: usize,
        faces: usize,
        duration_secs: f64,
    },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Emit a progress message, at most one every 40ms.
    ///
    /// The final progress (current == total) is always emitted.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        if should_emit_progress(now_ms, current, total) {
            Self::Progress {
                current,
                total,
                message: message.into(),
            }
            .emit();
        }
    }

    pub fn from_result(result: &ProcessingResult) -> Self {
        Self::FileCompleted {
            input_path: result.input_path.display().to_string(),
            faces: result
                .faces
                .iter()
                .map(|face| JsonFace {
                    index: face.index,
                    confidence: face.confidence,
                    region: [
                        face.region.left,
                        face.region.top,
                        face.region.right,
                        face.region.bottom,
                    ],
                    output_path: face
                        .output_path
                        .as_ref()
                        .map(|p| p.display().to_string()),
                })
                .collect(),
            rejected_faces: result.rejected_faces,
            processing_time_ms: result.processing_time.as_millis(),
        }
    }

    /// Create and emit file completed message
    pub fn file_completed(result: &ProcessingResult) {
        Self::from_result(result).emit();
    }

    /// Create and emit file failed message
    pub fn file_failed(input_path: &Path, error: impl Into<String>) {
        Self::FileFailed {
            input_path: input_path.display().to_string(),
            error: error.into(),
        }
        .emit();
    }

    /// Create and emit summary message
    pub fn summary(
        total_files: usize,
        processed: usize,
        skipped: usize,
        failed: usize,
        faces: usize,
        duration_secs: f64,
    ) {
        Self::Summary {
            total_files,
            processed,
            skipped,
            failed,
            faces,
            duration_secs,
        }
        .emit();
    }
}

/// Throttle check; records `now_ms` when it lets a message through
fn should_emit_progress(now_ms: u64, current: usize, total: usize) -> bool {
    let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

    if now_ms.saturating_sub(last_ms) >= PROGRESS_INTERVAL_MS || current == total {
        LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_processing::face_region::{FaceBox, RawBox};
    use crate::image_processing::orientation::ExifOrientation;
    use crate::image_processing::FaceCrop;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_message_tags() {
        let json = serde_json::to_string(&JsonMessage::FileFailed {
            input_path: "a.jpg".into(),
            error: "boom".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"filefailed","input_path":"a.jpg","error":"boom"}"#);

        let json = serde_json::to_string(&JsonMessage::Progress {
            current: 1,
            total: 2,
            message: "a.jpg".into(),
        })
        .unwrap();
        assert!(json.starts_with(r#"{"type":"progress""#));
    }

    #[test]
    fn test_completed_message_lists_faces() {
        let result = ProcessingResult {
            input_path: PathBuf::from("group.jpg"),
            image_size: (200, 100),
            orientation: ExifOrientation::TopLeft,
            detections: 2,
            faces: vec![FaceCrop {
                index: 0,
                confidence: 0.99,
                raw_box: RawBox::new(80.0, 40.0, 120.0, 60.0),
                region: FaceBox::new(68, 18, 132, 82),
                output_path: Some(PathBuf::from("out/group_face00.png")),
            }],
            rejected_faces: 1,
            debug_path: None,
            processing_time: Duration::from_millis(12),
        };

        match JsonMessage::from_result(&result) {
            JsonMessage::FileCompleted {
                faces,
                rejected_faces,
                processing_time_ms,
                ..
            } => {
                assert_eq!(faces.len(), 1);
                assert_eq!(faces[0].region, [68, 18, 132, 82]);
                assert_eq!(rejected_faces, 1);
                assert_eq!(processing_time_ms, 12);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_progress_throttling() {
        // far-future timestamps keep this independent of real emissions
        let base = u64::MAX / 2;
        assert!(should_emit_progress(base, 1, 10));
        assert!(!should_emit_progress(base + 10, 2, 10));
        assert!(should_emit_progress(base + 20, 10, 10));
        assert!(should_emit_progress(base + 20 + PROGRESS_INTERVAL_MS, 3, 10));
    }
}
