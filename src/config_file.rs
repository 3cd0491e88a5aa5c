use crate::cli::{Args, DetectorKind, OutputType};
use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::ArgMatches;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Saved processing profile
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    pub name: Option<String>,
    pub config: ProcessingConfigJson,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingConfigJson {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub margin: Option<f32>,
    pub confidence_threshold: Option<f32>,
    pub max_faces: Option<usize>,
    pub detector: Option<String>,
    pub detector_script: Option<String>,
    pub extensions: Option<String>,
    pub output_format: Option<String>,
    pub jobs: Option<usize>,
    pub debug: Option<bool>,
    pub report: Option<bool>,
    pub dry_run: Option<bool>,
    pub force: Option<bool>,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).context("Failed to parse config JSON")
    }
}

impl Args {
    /// Load configuration from a JSON file and merge with command-line arguments
    /// Command-line arguments take precedence over config file values
    pub fn load_and_merge_config(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(config_path) = self.config_file.clone() {
            let contents = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config = ConfigFile::parse(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

            self.merge_from_config(config.config, matches);

            match config.name {
                Some(name) => debug!("Loaded configuration '{}' from: {:?}", name, config_path),
                None => debug!("Loaded configuration from: {:?}", config_path),
            }
        }
        Ok(())
    }

    /// Fill in every value not given explicitly on the command line.
    /// `matches` must come from parsing `Args`; ids are the field names.
    pub fn merge_from_config(&mut self, config: ProcessingConfigJson, matches: &ArgMatches) {
        let given = |id: &str| matches.value_source(id) == Some(ValueSource::CommandLine);

        if !given("input_paths") {
            if let Some(input) = config.input_path {
                self.input_paths = vec![PathBuf::from(input)];
            }
        }

        if !given("output_dir") {
            if let Some(output) = config.output_path {
                self.output_dir = PathBuf::from(output);
            }
        }

        if !given("detector") {
            if let Some(detector) = config.detector {
                self.detector = match detector.as_str() {
                    "script" => DetectorKind::Script,
                    "sidecar" => DetectorKind::Sidecar,
                    other => {
                        warn!("Ignoring unknown detector in config: {}", other);
                        self.detector
                    }
                };
            }
        }

        if !given("output_format") {
            if let Some(format) = config.output_format {
                self.output_format = match format.to_lowercase().as_str() {
                    "png" => OutputType::Png,
                    "jpg" | "jpeg" => OutputType::Jpg,
                    other => {
                        warn!("Ignoring unknown output format in config: {}", other);
                        self.output_format
                    }
                };
            }
        }

        if !given("detector_script") {
            if let Some(script) = config.detector_script {
                self.detector_script = Some(PathBuf::from(script));
            }
        }

        if !given("margin") {
            if let Some(margin) = config.margin {
                self.margin = margin;
            }
        }

        if !given("confidence_threshold") {
            if let Some(threshold) = config.confidence_threshold {
                self.confidence_threshold = threshold;
            }
        }

        if !given("max_faces") {
            if let Some(max_faces) = config.max_faces {
                self.max_faces = max_faces;
            }
        }

        if !given("jobs") {
            if let Some(jobs) = config.jobs {
                self.jobs = jobs;
            }
        }

        if !given("extensions_str") {
            if let Some(ext) = config.extensions {
                self.extensions_str = ext;
            }
        }

        // Flags the user set stay set
        if !given("debug") {
            self.debug = config.debug.unwrap_or(self.debug);
        }

        if !given("report") {
            self.report = config.report.unwrap_or(self.report);
        }

        if !given("dry_run") {
            self.dry_run = config.dry_run.unwrap_or(self.dry_run);
        }

        if !given("force") {
            self.force = config.force.unwrap_or(self.force);
        }
    }
}
