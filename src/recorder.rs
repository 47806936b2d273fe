//! Raw frame recording.
//!
//! A recording session writes two streams into its own directory: the source
//! frames as delivered and the composited overlay as shown. Each stream is a
//! sequence of records, little-endian:
//!
//! ```text
//! u64 timestamp_us | u32 width | u32 height | width*height*3 bytes RGB8
//! ```
//!
//! `manifest.json` is written when the session starts and `stats.json` when it
//! is finished.

use crate::types::Frame;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use image::RgbImage;
use log::{error, info};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const SOURCE_STREAM: &str = "source.bin";
pub const OVERLAY_STREAM: &str = "overlay.bin";

/// Destination for a stream of RGB8 images.
pub trait FrameSink {
    fn write_frame(&mut self, timestamp_us: u64, width: u32, height: u32, rgb: &[u8]) -> io::Result<()>;

    /// Flush and close. Returns the number of frames written.
    fn finish(&mut self) -> io::Result<u64>;
}

pub struct RawRecorder {
    path: PathBuf,
    writer: BufWriter<File>,
    frames: u64,
    bytes: u64,
}

impl RawRecorder {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            frames: 0,
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl FrameSink for RawRecorder {
    fn write_frame(&mut self, timestamp_us: u64, width: u32, height: u32, rgb: &[u8]) -> io::Result<()> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{}x{} frame with {} bytes", width, height, rgb.len()),
            ));
        }
        self.writer.write_u64::<LittleEndian>(timestamp_us)?;
        self.writer.write_u32::<LittleEndian>(width)?;
        self.writer.write_u32::<LittleEndian>(height)?;
        self.writer.write_all(rgb)?;
        self.frames += 1;
        self.bytes += 16 + rgb.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<u64> {
        self.writer.flush()?;
        Ok(self.frames)
    }
}

/// One record read back from a raw stream.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Sequential reader for a raw stream.
pub struct RawReader<R: Read> {
    reader: R,
}

impl RawReader<BufReader<File>> {
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RawReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next record, `Ok(None)` at a clean end of stream.
    pub fn next_record(&mut self) -> io::Result<Option<RawRecord>> {
        let timestamp_us = match self.reader.read_u64::<LittleEndian>() {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        };
        let width = self.reader.read_u32::<LittleEndian>()?;
        let height = self.reader.read_u32::<LittleEndian>()?;
        let mut data = vec![0u8; width as usize * height as usize * 3];
        self.reader.read_exact(&mut data)?;
        Ok(Some(RawRecord {
            timestamp_us,
            width,
            height,
            data,
        }))
    }
}

/// An active recording: source and overlay sinks in one session directory.
pub struct RecordingSession {
    dir: PathBuf,
    source: RawRecorder,
    overlay: RawRecorder,
    started: Instant,
}

impl RecordingSession {
    /// Create `session_<unix_ms>` under `output_dir` and open both streams.
    pub fn start(output_dir: &Path) -> io::Result<Self> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let mut dir = output_dir.join(format!("session_{}", millis));
        let mut n = 1;
        while dir.exists() {
            dir = output_dir.join(format!("session_{}_{}", millis, n));
            n += 1;
        }
        fs::create_dir_all(&dir)?;

        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": "target-overlay",
            "format": {
                "pixel": "rgb8",
                "record": ["u64le timestamp_us", "u32le width", "u32le height", "pixels"],
            },
            "streams": [
                { "name": "source", "file": SOURCE_STREAM },
                { "name": "overlay", "file": OVERLAY_STREAM },
            ],
        });
        let text = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
        fs::write(dir.join("manifest.json"), text)?;

        let source = RawRecorder::create(&dir.join(SOURCE_STREAM))?;
        let overlay = RawRecorder::create(&dir.join(OVERLAY_STREAM))?;
        info!("Recording → {:?}", dir);
        Ok(Self {
            dir,
            source,
            overlay,
            started: Instant::now(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Write one source frame and the composite shown for it.
    pub fn record(&mut self, timestamp_us: u64, source: &Frame, composite: &RgbImage) -> io::Result<()> {
        self.source
            .write_frame(timestamp_us, source.width(), source.height(), source.data())?;
        self.overlay.write_frame(
            timestamp_us,
            composite.width(),
            composite.height(),
            composite.as_raw(),
        )
    }

    /// Flush both streams and write `stats.json`.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        let source_frames = self.source.finish()?;
        let overlay_frames = self.overlay.finish()?;
        let stats = json!({
            "duration_secs": self.started.elapsed().as_secs_f64(),
            "source_frames": source_frames,
            "source_bytes": self.source.bytes(),
            "overlay_frames": overlay_frames,
            "overlay_bytes": self.overlay.bytes(),
        });
        let text = serde_json::to_string_pretty(&stats).map_err(io::Error::other)?;
        fs::write(self.dir.join("stats.json"), text)
            .unwrap_or_else(|e| error!("Failed to write stats: {}", e));
        info!(
            "Recording saved: {} frames, {:.1}s → {:?}",
            source_frames,
            self.started.elapsed().as_secs_f64(),
            self.dir
        );
        Ok(self.dir)
    }
}
