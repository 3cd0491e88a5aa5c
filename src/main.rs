use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches};
use console::style;
use std::time::Instant;

use facecrop_processor::cli::{Args, DetectorKind};
use facecrop_processor::image_processing::face_detection::{
    FaceDetector, ScriptDetector, SidecarDetector,
};
use facecrop_processor::image_processing::report::RegionReport;
use facecrop_processor::image_processing::{
    BatchResults, ProcessingConfig, ProcessingEngine, SkipReason,
};
use facecrop_processor::json_output::JsonMessage;
use facecrop_processor::utils::{
    create_progress_bar, format_duration, init_logging, validate_inputs,
};

fn build_detector(args: &Args) -> Result<Box<dyn FaceDetector>> {
    match args.detector {
        DetectorKind::Sidecar => Ok(Box::new(SidecarDetector)),
        DetectorKind::Script => {
            let script = args
                .detector_script
                .as_deref()
                .context("--detector script requires --detector-script <FILE>")?;
            Ok(Box::new(ScriptDetector::new(script)?))
        }
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let matches = Args::command().get_matches();
    let mut args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(args.verbose);
    args.load_and_merge_config(&matches)?;

    let json_mode = args.json_progress;

    if !json_mode {
        println!("{}", style("Face Crop Processor").bold().blue());
        println!("{}", style("Square face thumbnails from detector boxes").dim());
        println!();
    }

    validate_inputs(&args)?;

    let config = ProcessingConfig {
        margin: args.margin,
        confidence_threshold: args.confidence_threshold,
        max_faces: args.max_faces,
        output_format: args.output_format,
        extensions: args.parse_extensions(),
        parallel_jobs: args.effective_jobs(),
        debug: args.debug,
        dry_run: args.dry_run,
        force: args.force,
    };

    let detector = build_detector(&args)?;

    if args.verbose && !json_mode {
        println!("{}", style("Configuration:").bold());
        println!("  Detector: {}", detector.name());
        if let Some(ref script) = args.detector_script {
            println!("    Script: {}", script.display());
        }
        println!("  Margin: {}", config.margin);
        println!("  Confidence threshold: {}", config.confidence_threshold);
        println!("  Max faces per image: {}", config.max_faces);
        println!("  Output format: {}", config.output_format.extension());
        println!("  Parallel jobs: {}", config.parallel_jobs);
        println!("  Extensions: {:?}", config.extensions);
        if config.debug {
            println!("  Debug mode: enabled - will write detection overlays");
        }
        if config.dry_run {
            println!("  Dry run mode: enabled (simulation only - no files will be created)");
        }
        println!();
    }

    // Create output directory (skip in dry-run mode)
    if !config.dry_run {
        std::fs::create_dir_all(&args.output_dir).context("Failed to create output directory")?;
    }

    let dry_run_mode = config.dry_run;
    let engine = ProcessingEngine::new(config, detector)?;

    let image_files = engine.discover_images(&args.input_paths)?;

    if image_files.is_empty() {
        if json_mode {
            JsonMessage::summary(0, 0, 0, 0, 0, start_time.elapsed().as_secs_f64());
        } else {
            println!(
                "{}",
                style("No images found with specified extensions").red()
            );
        }
        return Ok(());
    }

    let total = image_files.len();
    let results = if json_mode {
        engine.process_batch(&image_files, &args.output_dir, |current, path| {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown");
            JsonMessage::progress(current, total, name);
        })
    } else {
        let progress = create_progress_bar(total as u64);
        progress.set_message("Cropping faces");
        let results = engine.process_batch(&image_files, &args.output_dir, |current, _| {
            progress.set_position(current as u64);
        });
        progress.finish_with_message("✓ Processing complete!");
        println!();
        results
    };

    let total_time = start_time.elapsed();

    if json_mode {
        for result in &results.processed {
            JsonMessage::file_completed(result);
        }
        for (path, error) in &results.failed {
            JsonMessage::file_failed(path, format!("{:#}", error));
        }
        JsonMessage::summary(
            results.total(),
            results.processed.len(),
            results.skipped.len(),
            results.failed.len(),
            results.faces_found(),
            total_time.as_secs_f64(),
        );
        return Ok(());
    }

    if args.report {
        let mut report = RegionReport::new();
        for result in &results.processed {
            report.add_result(result);
        }
        report.print();
    }

    print_summary(&results, &args, dry_run_mode, total_time);

    Ok(())
}

fn print_summary(
    results: &BatchResults,
    args: &Args,
    dry_run_mode: bool,
    total_time: std::time::Duration,
) {
    let successful = results.processed.len();
    let failed = results.failed.len();
    let skipped = results.skipped.len();
    let faces_found = results.faces_found();
    let rejected: usize = results.processed.iter().map(|r| r.rejected_faces).sum();

    let header = if dry_run_mode {
        style("Dry Run Results Summary:").bold().cyan()
    } else {
        style("Results Summary:").bold().green()
    };
    println!("{}", header);

    let processed_label = if dry_run_mode {
        "Would be processed"
    } else {
        "Successfully processed"
    };
    println!("  {}: {}", processed_label, style(successful).bold().green());
    if failed > 0 {
        println!("  Failed: {}", style(failed).bold().red());
    }
    if skipped > 0 {
        println!(
            "  Skipped (already exist): {}",
            style(skipped).bold().yellow()
        );
    }

    println!();
    println!("{}", style("Face Detection Results:").bold().cyan());
    let with_faces = results
        .processed
        .iter()
        .filter(|r| !r.faces.is_empty())
        .count();
    println!(
        "  Images with faces: {}",
        style(with_faces).bold().green()
    );
    println!(
        "  Images without faces: {}",
        style(successful - with_faces).bold().yellow()
    );
    if successful > with_faces && !dry_run_mode {
        println!(
            "{}",
            style("    (no crop was written, so these are scanned again on the next run)").dim()
        );
    }
    println!("  Total faces cropped: {}", style(faces_found).bold().cyan());
    if rejected > 0 {
        println!(
            "  Faces rejected (invalid box): {}",
            style(rejected).bold().red()
        );
    }
    if successful > 0 {
        println!(
            "  Average faces per image: {}",
            style(format!("{:.1}", faces_found as f64 / successful as f64)).dim()
        );
    }

    println!();
    println!("{}", style("Performance:").bold().blue());
    println!(
        "  Total processing time: {}",
        style(format_duration(total_time)).bold()
    );
    let total = results.total().max(1) as u32;
    println!(
        "  Average time per image: {}",
        style(format_duration(total_time / total)).dim()
    );

    println!();
    let location_label = if dry_run_mode {
        "Would be saved to"
    } else {
        "Output directory"
    };
    println!("  {}: {}", location_label, args.output_dir.display());

    if dry_run_mode {
        println!();
        println!("{}", style("Dry Run Mode:").bold().yellow());
        println!("  • No files were created during this simulation");
        println!("  • Remove --dry-run to actually crop the faces");
    }

    if failed > 0 {
        println!();
        println!("{}", style("Errors encountered:").bold().red());
        for (i, (path, error)) in results.failed.iter().enumerate() {
            let filename = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown");
            println!(
                "  {}: {} - {:#}",
                style(format!("#{}", i + 1)).dim(),
                style(filename).bold().red(),
                error
            );
        }
        println!();
        println!("  Check image files and try again with --verbose for more details");
    }

    if skipped > 0 {
        println!();
        println!(
            "{}",
            style("Skipped files (already exist):").bold().yellow()
        );
        for (i, skipped) in results.skipped.iter().enumerate() {
            let filename = skipped
                .input_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown");

            let reason_desc = match skipped.reason {
                SkipReason::OutputExists => "skipped",
            };

            let existing_filename = skipped
                .existing_output_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("unknown");

            println!(
                "  {}: {} - {} (existing: {})",
                style(format!("#{}", i + 1)).dim(),
                style(filename).bold().yellow(),
                reason_desc,
                style(existing_filename).dim()
            );
        }
        println!("  Use --force to process all files regardless of existing outputs");
    }
}
