//! Batch orchestration over `(input, output, annotation)` triplets.
//!
//! Each triplet runs to completion or fails on its own; a failure is recorded
//! and the batch moves on to the next triplet.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vidredact_annotation_model::loader::{load_annotations, AnnotationError};
use vidredact_common::config::MediaConfig;
use vidredact_common::error::{RedactError, RedactResult};

use crate::media::{
    command_exists, FfmpegDecoder, FfmpegEncoder, FrameSink, FrameSource, StreamInfo,
};
use crate::pipeline::{redact_stream, RedactionSettings, VideoStats};

/// One unit of batch work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triplet {
    pub input: PathBuf,
    pub output: PathBuf,
    pub annotation: PathBuf,
}

impl Triplet {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        annotation: impl Into<PathBuf>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            annotation: annotation.into(),
        }
    }

    /// Group positional arguments three at a time.
    ///
    /// The count must be a non-zero multiple of three.
    pub fn from_args(args: &[PathBuf]) -> RedactResult<Vec<Self>> {
        if args.is_empty() || args.len() % 3 != 0 {
            return Err(RedactError::config(format!(
                "Expected (input, output, annotation) triplets, got {} path(s)",
                args.len()
            )));
        }
        Ok(args
            .chunks_exact(3)
            .map(|chunk| Self::new(&chunk[0], &chunk[1], &chunk[2]))
            .collect())
    }
}

/// Opens decoders and encoders for a batch.
pub trait MediaBackend {
    fn open_source(&self, input: &Path) -> RedactResult<Box<dyn FrameSource>>;

    fn open_sink(&self, output: &Path, info: &StreamInfo) -> RedactResult<Box<dyn FrameSink>>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// ffmpeg/ffprobe subprocess backend.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    media: MediaConfig,
}

impl FfmpegBackend {
    pub fn new(media: MediaConfig) -> Self {
        Self { media }
    }

    /// Whether both configured binaries can be found.
    pub fn is_available(&self) -> bool {
        command_exists(&self.media.ffmpeg_bin)
            && command_exists(&self.media.ffprobe_bin)
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, input: &Path) -> RedactResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegDecoder::open(input, &self.media)?))
    }

    fn open_sink(&self, output: &Path, info: &StreamInfo) -> RedactResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegEncoder::create(output, info, &self.media)?))
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Result of one triplet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TripletStatus {
    Succeeded { stats: VideoStats },
    Failed { kind: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripletOutcome {
    #[serde(flatten)]
    pub triplet: Triplet,

    #[serde(flatten)]
    pub status: TripletStatus,
}

impl TripletOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TripletStatus::Succeeded { .. })
    }
}

/// Aggregate outcome of a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub items: Vec<TripletOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn to_json(&self) -> RedactResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> RedactResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Runs triplets one after another against a media backend.
pub struct BatchRunner<B: MediaBackend> {
    backend: B,
    settings: RedactionSettings,
}

impl<B: MediaBackend> BatchRunner<B> {
    pub fn new(backend: B, settings: RedactionSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &RedactionSettings {
        &self.settings
    }

    /// Process every triplet in order. Never stops early.
    pub fn run(&self, triplets: &[Triplet]) -> BatchReport {
        let started_at = Utc::now();
        tracing::info!(
            triplets = triplets.len(),
            backend = self.backend.name(),
            "Starting batch"
        );

        let mut items = Vec::with_capacity(triplets.len());
        for (position, triplet) in triplets.iter().enumerate() {
            tracing::info!(
                item = position + 1,
                of = triplets.len(),
                input = %triplet.input.display(),
                output = %triplet.output.display(),
                annotation = %triplet.annotation.display(),
                "Processing video"
            );

            let status = match self.run_triplet(triplet) {
                Ok(stats) => {
                    tracing::info!(
                        input = %triplet.input.display(),
                        frames = stats.frames_written,
                        regions = stats.regions_blurred,
                        skipped_occluded = stats.regions_skipped_occluded,
                        skipped_degenerate = stats.regions_skipped_degenerate,
                        elapsed_secs = stats.elapsed.as_secs_f64(),
                        "Video processed"
                    );
                    TripletStatus::Succeeded { stats }
                }
                Err(err) => {
                    tracing::error!(
                        input = %triplet.input.display(),
                        kind = err.kind(),
                        error = %err,
                        "Video failed"
                    );
                    TripletStatus::Failed {
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    }
                }
            };
            items.push(TripletOutcome {
                triplet: triplet.clone(),
                status,
            });
        }

        let report = BatchReport {
            started_at,
            finished_at: Utc::now(),
            items,
        };
        tracing::info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }

    /// Process a single triplet. Decoder and encoder are released before
    /// this returns, whatever the outcome.
    pub fn run_triplet(&self, triplet: &Triplet) -> RedactResult<VideoStats> {
        if !triplet.input.exists() {
            return Err(RedactError::FileNotFound {
                path: triplet.input.clone(),
            });
        }
        if let Some(parent) = triplet.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let index = load_annotations(&triplet.annotation)
            .map_err(|e| annotation_error(&triplet.annotation, e))?;
        tracing::debug!(
            frames = index.frame_count(),
            regions = index.region_count(),
            "Annotations loaded"
        );

        let mut source = self.backend.open_source(&triplet.input)?;
        let mut sink = self.backend.open_sink(&triplet.output, source.stream_info())?;
        redact_stream(source.as_mut(), sink.as_mut(), &index, &self.settings)
    }
}

fn annotation_error(path: &Path, err: AnnotationError) -> RedactError {
    if err.is_not_found() {
        RedactError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        RedactError::parse(format!("{}: {err}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triplets_from_args() {
        let args: Vec<PathBuf> = ["a.mp4", "a_out.mp4", "a.xml", "b.mp4", "b_out.mp4", "b.xml"]
            .iter()
            .map(PathBuf::from)
            .collect();
        let triplets = Triplet::from_args(&args).unwrap();
        assert_eq!(triplets.len(), 2);
        assert_eq!(triplets[1], Triplet::new("b.mp4", "b_out.mp4", "b.xml"));
    }

    #[test]
    fn test_triplet_count_must_be_multiple_of_three() {
        let args: Vec<PathBuf> = ["a.mp4", "a_out.mp4"].iter().map(PathBuf::from).collect();
        assert_eq!(Triplet::from_args(&args).unwrap_err().kind(), "config");
        assert_eq!(Triplet::from_args(&[]).unwrap_err().kind(), "config");
    }

    #[test]
    fn test_annotation_error_mapping() {
        let path = Path::new("/nowhere/missing.xml");
        let missing = load_annotations(path).unwrap_err();
        assert!(matches!(
            annotation_error(path, missing),
            RedactError::FileNotFound { .. }
        ));

        let malformed = vidredact_annotation_model::loader::parse_annotations("<a>").unwrap_err();
        assert_eq!(annotation_error(path, malformed).kind(), "parse");
    }

    #[test]
    fn test_report_counts_and_json() {
        let now = Utc::now();
        let report = BatchReport {
            started_at: now,
            finished_at: now,
            items: vec![
                TripletOutcome {
                    triplet: Triplet::new("a.mp4", "a_out.mp4", "a.xml"),
                    status: TripletStatus::Succeeded {
                        stats: VideoStats::default(),
                    },
                },
                TripletOutcome {
                    triplet: Triplet::new("b.mp4", "b_out.mp4", "b.xml"),
                    status: TripletStatus::Failed {
                        kind: "not_found".to_string(),
                        message: "File not found: b.mp4".to_string(),
                    },
                },
            ],
        };
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["items"][0]["status"], "succeeded");
        assert_eq!(json["items"][1]["kind"], "not_found");
        assert_eq!(json["items"][1]["input"], "b.mp4");
    }
}
