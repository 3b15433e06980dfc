//! Redact a batch of videos.

use std::path::PathBuf;

use vidredact_common::config::AppConfig;
use vidredact_render_engine::{BatchRunner, FfmpegBackend, RedactionSettings, Triplet, TripletStatus};

pub fn run(
    config: AppConfig,
    args: Vec<PathBuf>,
    report_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    config.validate()?;
    let triplets = Triplet::from_args(&args)?;

    let backend = FfmpegBackend::new(config.media.clone());
    if !backend.is_available() {
        anyhow::bail!(
            "Media tools not found (expected `{}` and `{}` in PATH). Run `vidredact check`.",
            config.media.ffmpeg_bin,
            config.media.ffprobe_bin
        );
    }

    let runner = BatchRunner::new(backend, RedactionSettings::from(&config));
    let report = runner.run(&triplets);

    println!();
    for item in &report.items {
        match &item.status {
            TripletStatus::Succeeded { stats } => println!(
                "[OK]   {} -> {} ({} frames, {} regions, {:.1}s)",
                item.triplet.input.display(),
                item.triplet.output.display(),
                stats.frames_written,
                stats.regions_blurred,
                stats.elapsed.as_secs_f64()
            ),
            TripletStatus::Failed { message, .. } => {
                println!("[FAIL] {}: {message}", item.triplet.input.display())
            }
        }
    }
    println!();
    println!("{} succeeded, {} failed", report.succeeded(), report.failed());

    if let Some(path) = report_path {
        report.write_json(&path)?;
        println!("Report: {}", path.display());
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} of {} videos failed", report.failed(), report.items.len());
    }
    Ok(())
}
