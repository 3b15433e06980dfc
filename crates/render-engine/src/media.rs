//! Frame sources and sinks.
//!
//! Production media goes through ffmpeg subprocesses exchanging raw `rgb24`
//! frames over pipes. In-memory implementations back the tests.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::{Deserialize, Serialize};

use vidredact_common::config::MediaConfig;
use vidredact_common::error::{RedactError, RedactResult};

/// Rational frame rate, e.g. `30000/1001`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Parse ffprobe's `"num/den"` or a bare integer. Zero rates are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (num, den): (u32, u32) = match raw.split_once('/') {
            Some((n, d)) => (n.trim().parse().ok()?, d.trim().parse().ok()?),
            None => (raw.parse().ok()?, 1),
        };
        (num > 0 && den > 0).then_some(Self { num, den })
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self { num: 30, den: 1 }
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Stream descriptors read at open time and reused for the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub frame_rate: FrameRate,

    /// Container-reported frame count. Advisory only; never used to stop
    /// reading.
    pub frame_count: Option<u64>,
}

impl StreamInfo {
    /// Size of one `rgb24` frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// Sequential decoded-frame reader.
pub trait FrameSource {
    fn stream_info(&self) -> &StreamInfo;

    /// Next frame in order, or `None` at end of stream.
    fn next_frame(&mut self) -> RedactResult<Option<RgbImage>>;
}

/// Sequential frame writer.
pub trait FrameSink {
    /// Append one frame. Frames are stored in call order.
    fn write_frame(&mut self, frame: &RgbImage) -> RedactResult<()>;

    /// Flush and close. Calling it again is a no-op.
    fn finish(&mut self) -> RedactResult<()>;
}

/// Whether `binary` resolves on `PATH` (or is an existing path).
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

/// Read width, height, frame rate and frame count of the first video stream.
pub fn probe_stream(path: &Path, media: &MediaConfig) -> RedactResult<StreamInfo> {
    let output = Command::new(&media.ffprobe_bin)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| RedactError::open(format!("Failed to run {}: {e}", media.ffprobe_bin)))?;

    if !output.status.success() {
        return Err(RedactError::open(format!(
            "ffprobe could not read {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&raw)
        .map_err(|e| RedactError::open(format!("{}: {e}", path.display())))
}

/// Turn ffprobe JSON into stream descriptors.
///
/// `r_frame_rate` is preferred; `avg_frame_rate` is the fallback.
pub fn parse_probe_output(json: &str) -> RedactResult<StreamInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| RedactError::open(format!("Unreadable ffprobe output: {e}")))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| RedactError::open("No video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(RedactError::open("Video stream has no frame size")),
    };

    let frame_rate = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|raw| FrameRate::parse(raw))
        .ok_or_else(|| RedactError::open("Video stream has no usable frame rate"))?;

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok());

    Ok(StreamInfo {
        width,
        height,
        frame_rate,
        frame_count,
    })
}

/// Decodes a video file into `rgb24` frames through an ffmpeg child process.
pub struct FfmpegDecoder {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    stdout: Option<ChildStdout>,
    finished: bool,
}

impl FfmpegDecoder {
    pub fn open(path: &Path, media: &MediaConfig) -> RedactResult<Self> {
        let info = probe_stream(path, media)?;

        let mut cmd = Command::new(&media.ffmpeg_bin);
        cmd.args(decoder_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| RedactError::open(format!("Failed to start decoder: {e}")))?;
        let stdout = child.stdout.take();
        if stdout.is_none() {
            reap(&mut child);
            return Err(RedactError::open("Failed to capture decoder stdout"));
        }

        tracing::debug!(
            pid = child.id(),
            input = %path.display(),
            width = info.width,
            height = info.height,
            fps = %info.frame_rate,
            "Decoder started"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            finished: false,
        })
    }

    /// Process id of the ffmpeg child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    fn end_of_stream(&mut self) -> RedactResult<()> {
        self.finished = true;
        self.stdout = None;
        let status = self
            .child
            .wait()
            .map_err(|e| RedactError::frame_io(format!("Failed to wait on decoder: {e}")))?;
        if !status.success() {
            return Err(RedactError::frame_io(format!(
                "Decoder for {} exited with status {status}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

/// Decoder command line. Frames come out in stored orientation, one per
/// decoded picture, so the output matches the probed size and frame count.
fn decoder_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_os_string());
    args.extend(
        [
            "-map", "0:v:0", "-fps_mode", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24",
            "-",
        ]
        .iter()
        .map(OsString::from),
    );
    args
}

impl FrameSource for FfmpegDecoder {
    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> RedactResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; self.info.frame_bytes()];
        let filled = read_full(stdout, &mut buf)
            .map_err(|e| RedactError::frame_io(format!("Failed reading decoded frame: {e}")))?;

        if filled == 0 {
            self.end_of_stream()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.end_of_stream()?;
            return Err(RedactError::frame_io(format!(
                "Truncated frame from {}: got {filled} of {} bytes",
                self.path.display(),
                buf.len()
            )));
        }

        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| RedactError::frame_io("Decoded frame has the wrong size"))
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        if !self.finished {
            self.stdout = None;
            reap(&mut self.child);
        }
    }
}

/// Encodes `rgb24` frames into a video file through an ffmpeg child process.
pub struct FfmpegEncoder {
    path: PathBuf,
    info: StreamInfo,
    child: Child,
    stdin: Option<ChildStdin>,
    finished: bool,
}

impl FfmpegEncoder {
    /// Start an encoder matching `info` exactly in size and frame rate.
    pub fn create(path: &Path, info: &StreamInfo, media: &MediaConfig) -> RedactResult<Self> {
        let mut cmd = Command::new(&media.ffmpeg_bin);
        cmd.args(["-y", "-v", "error", "-f", "rawvideo", "-pix_fmt", "rgb24"])
            .arg("-s")
            .arg(format!("{}x{}", info.width, info.height))
            .arg("-r")
            .arg(info.frame_rate.to_string())
            .args(["-i", "-", "-an", "-c:v"])
            .arg(&media.video_codec)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| RedactError::open(format!("Failed to start encoder: {e}")))?;
        let stdin = child.stdin.take();
        if stdin.is_none() {
            reap(&mut child);
            return Err(RedactError::open("Failed to capture encoder stdin"));
        }

        tracing::debug!(
            pid = child.id(),
            output = %path.display(),
            codec = %media.video_codec,
            "Encoder started"
        );

        Ok(Self {
            path: path.to_path_buf(),
            info: info.clone(),
            child,
            stdin,
            finished: false,
        })
    }

    /// Process id of the ffmpeg child.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl FrameSink for FfmpegEncoder {
    fn write_frame(&mut self, frame: &RgbImage) -> RedactResult<()> {
        if frame.dimensions() != (self.info.width, self.info.height) {
            return Err(RedactError::frame_io(format!(
                "Frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.info.width,
                self.info.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RedactError::frame_io("Encoder is already closed"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| RedactError::frame_io(format!("Failed writing frame: {e}")))
    }

    fn finish(&mut self) -> RedactResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.stdin = None;

        let status = self
            .child
            .wait()
            .map_err(|e| RedactError::frame_io(format!("Failed to wait on encoder: {e}")))?;
        if !status.success() {
            return Err(RedactError::frame_io(format!(
                "Encoder for {} exited with status {status}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if !self.finished {
            self.stdin = None;
            reap(&mut self.child);
        }
    }
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Frame source over frames held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<RgbImage>,
}

impl MemorySource {
    /// Stream info is taken from the first frame; an empty source is 0x0.
    pub fn new(frames: Vec<RgbImage>, frame_rate: FrameRate) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        Self {
            info: StreamInfo {
                width,
                height,
                frame_rate,
                frame_count: Some(frames.len() as u64),
            },
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemorySource {
    fn stream_info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> RedactResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Frame sink collecting frames in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Vec<RgbImage>,
    finished: bool,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose write fails once `count` frames have been stored.
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> RedactResult<()> {
        if self.finished {
            return Err(RedactError::frame_io("Sink is already closed"));
        }
        if self.fail_after.is_some_and(|limit| self.frames.len() >= limit) {
            return Err(RedactError::frame_io("Sink rejected frame"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> RedactResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frame_rate_parse() {
        assert_eq!(FrameRate::parse("30000/1001"), Some(FrameRate::new(30000, 1001)));
        assert_eq!(FrameRate::parse("25"), Some(FrameRate::new(25, 1)));
        assert_eq!(FrameRate::parse("0/0"), None);
        assert_eq!(FrameRate::parse("abc"), None);
        assert_eq!(FrameRate::new(24000, 1001).to_string(), "24000/1001");
        assert!((FrameRate::new(30, 1).as_f64() - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "programs": [],
            "streams": [
                {
                    "width": 1280,
                    "height": 720,
                    "r_frame_rate": "30000/1001",
                    "avg_frame_rate": "30000/1001",
                    "nb_frames": "300"
                }
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.width, 1280);
        assert_eq!(info.height, 720);
        assert_eq!(info.frame_rate, FrameRate::new(30000, 1001));
        assert_eq!(info.frame_count, Some(300));
        assert_eq!(info.frame_bytes(), 1280 * 720 * 3);
    }

    #[test]
    fn test_parse_probe_falls_back_to_average_rate() {
        let json = r#"{"streams":[{"width":64,"height":48,"r_frame_rate":"0/0","avg_frame_rate":"25/1"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!(info.frame_rate, FrameRate::new(25, 1));
        assert_eq!(info.frame_count, None);
    }

    #[test]
    fn test_parse_probe_rejects_missing_stream() {
        let err = parse_probe_output(r#"{"streams":[]}"#).unwrap_err();
        assert_eq!(err.kind(), "open");
        let err = parse_probe_output("not json").unwrap_err();
        assert_eq!(err.kind(), "open");
        let err = parse_probe_output(r#"{"streams":[{"width":0,"height":10,"r_frame_rate":"30/1"}]}"#)
            .unwrap_err();
        assert_eq!(err.kind(), "open");
    }

    #[test]
    fn test_read_full_stops_at_eof() {
        let data = [1u8, 2, 3, 4, 5];
        let mut reader = &data[..];
        let mut buf = [0u8; 3];
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 3);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 2);
        assert_eq!(read_full(&mut reader, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_source_and_sink() {
        let frames = vec![
            RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])),
            RgbImage::from_pixel(4, 3, Rgb([4, 5, 6])),
        ];
        let mut source = MemorySource::new(frames.clone(), FrameRate::default());
        assert_eq!(source.stream_info().width, 4);
        assert_eq!(source.stream_info().frame_count, Some(2));

        let mut sink = MemorySink::new();
        while let Some(frame) = source.next_frame().unwrap() {
            sink.write_frame(&frame).unwrap();
        }
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.is_finished());
        assert_eq!(sink.into_frames(), frames);
    }

    #[test]
    fn test_failing_sink() {
        let frame = RgbImage::new(2, 2);
        let mut sink = MemorySink::failing_after(1);
        sink.write_frame(&frame).unwrap();
        let err = sink.write_frame(&frame).unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_decoder_keeps_stored_orientation_and_every_frame() {
        let args: Vec<String> = decoder_args(Path::new("in put.mp4"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let noautorotate = args.iter().position(|a| a == "-noautorotate").unwrap();
        assert!(noautorotate < input);
        assert_eq!(args[input + 1], "in put.mp4");

        let fps_mode = args.iter().position(|a| a == "-fps_mode").unwrap();
        assert!(fps_mode > input);
        assert_eq!(args[fps_mode + 1], "passthrough");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_missing_ffprobe_is_open_error() {
        let media = MediaConfig {
            ffprobe_bin: "/nonexistent/vidredact-ffprobe".to_string(),
            ..MediaConfig::default()
        };
        let err = probe_stream(Path::new("input.mp4"), &media).unwrap_err();
        assert_eq!(err.kind(), "open");
        assert!(!command_exists("/nonexistent/vidredact-ffprobe"));
    }
}
