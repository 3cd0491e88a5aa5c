// Library exports for reuse by other front ends
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod utils;

// Re-export commonly used types
pub use cli::{DetectorKind, OutputType};
pub use error::FaceRegionError;
pub use image_processing::face_region::{FaceBox, FaceRegion, RawBox, FACE_REGION_SIZE};
pub use image_processing::{ProcessingConfig, ProcessingEngine, ProcessingResult};
pub use json_output::JsonMessage;
