//! JSONL detection log reader: replays recorded tracker output.
//!
//! The first line is a header describing the video geometry, every following
//! line is one frame's results:
//!
//! ```text
//! {"format":"target-overlay","width":640,"height":480,"fps":30}
//! {"t":0.000,"results":[{"track_id":1,"bbox":[100,80,140,120]}]}
//! {"t":0.033,"results":[]}
//! ```
//!
//! Works with any `BufRead`. Frames are synthesized from the results since
//! the log carries no pixels.

use crate::error::ReplayError;
use crate::simulator::render_scene;
use crate::types::{Delivery, DetectionResult, NOMINAL_FPS};
use crossbeam_channel::{SendTimeoutError, Sender};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const FORMAT: &str = "target-overlay";

/// Parsed header line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayHeader {
    pub format: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

fn default_fps() -> f64 {
    NOMINAL_FPS
}

/// One frame's worth of detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Seconds since the start of the log.
    #[serde(default)]
    pub t: f64,
    #[serde(default)]
    pub results: Vec<DetectionResult>,
}

/// Line-by-line detection log reader.
pub struct DetectionReader<R: BufRead> {
    reader: R,
    pub header: ReplayHeader,
    line_buf: String,
    line_no: usize,
}

impl<R: BufRead> DetectionReader<R> {
    /// Read and validate the header line.
    pub fn open(mut reader: R) -> Result<Self, ReplayError> {
        let mut first_line = String::new();
        reader.read_line(&mut first_line)?;
        let first_line = first_line.trim();
        if first_line.is_empty() {
            return Err(ReplayError::Empty);
        }

        let header: ReplayHeader =
            serde_json::from_str(first_line).map_err(|e| ReplayError::Header(e.to_string()))?;
        if header.format != FORMAT {
            return Err(ReplayError::Header(format!("unknown format: {}", header.format)));
        }
        if header.width == 0 || header.height == 0 {
            return Err(ReplayError::Header(format!(
                "zero frame size {}x{}",
                header.width, header.height
            )));
        }

        Ok(Self {
            reader,
            header,
            line_buf: String::new(),
            line_no: 1,
        })
    }

    /// Read the next record. Returns `None` at EOF; blank lines are skipped.
    pub fn next_record(&mut self) -> Option<Result<DetectionRecord, ReplayError>> {
        loop {
            self.line_buf.clear();
            match self.reader.read_line(&mut self.line_buf) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_no += 1;
                    let trimmed = self.line_buf.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(serde_json::from_str(trimmed).map_err(|source| ReplayError::Record {
                        line: self.line_no,
                        source,
                    }));
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    /// Read all remaining records, skipping malformed lines.
    pub fn read_all(mut self) -> Vec<DetectionRecord> {
        let mut records = Vec::new();
        while let Some(result) = self.next_record() {
            match result {
                Ok(r) => records.push(r),
                Err(e) => warn!("skipping {}", e),
            }
        }
        records
    }

    /// Turn a record into a queue delivery with a synthesized frame.
    pub fn delivery(&self, record: DetectionRecord, index: u64) -> Option<Delivery> {
        match render_scene(self.header.width, self.header.height, &record.results, index) {
            Ok(frame) => Some(Delivery::new(frame, record.results)),
            Err(e) => {
                warn!("cannot synthesize frame: {}", e);
                None
            }
        }
    }

    /// Feed every record into `tx`, paced at the header's frame rate when
    /// `paced`. Stops early on shutdown or when the consumer goes away.
    /// Returns the number of deliveries sent.
    pub fn replay(mut self, tx: &Sender<Delivery>, shutdown: &Arc<AtomicBool>, paced: bool) -> u64 {
        info!(
            "Replaying detection log: {}x{} @ {:.0} fps",
            self.header.width, self.header.height, self.header.fps
        );
        let interval = Duration::from_secs_f64(1.0 / self.header.fps.max(1.0));
        let mut sent = 0u64;
        'records: while let Some(result) = self.next_record() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!("skipping {}", e);
                    continue;
                }
            };
            let Some(mut delivery) = self.delivery(record, sent) else {
                break;
            };
            loop {
                if shutdown.load(Ordering::Relaxed) {
                    break 'records;
                }
                match tx.send_timeout(delivery, Duration::from_millis(100)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(d)) => delivery = d,
                    Err(SendTimeoutError::Disconnected(_)) => break 'records,
                }
            }
            sent += 1;
            if paced {
                thread::sleep(interval);
            }
        }
        info!("Replay finished after {} frames", sent);
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::io::Cursor;

    fn header() -> String {
        r#"{"format":"target-overlay","width":64,"height":48,"fps":30}"#.to_string()
    }

    fn record(t: f64, id: u64) -> String {
        format!(r#"{{"t":{},"results":[{{"track_id":{},"bbox":[10,10,20,20]}}]}}"#, t, id)
    }

    #[test]
    fn test_open_valid_header() {
        let reader = DetectionReader::open(Cursor::new(header() + "\n")).unwrap();
        assert_eq!(reader.header.width, 64);
        assert_eq!(reader.header.fps, 30.0);
    }

    #[test]
    fn test_open_rejects_bad_headers() {
        assert!(matches!(DetectionReader::open(Cursor::new("")), Err(ReplayError::Empty)));
        let wrong = r#"{"format":"something-else","width":1,"height":1}"#;
        let err = DetectionReader::open(Cursor::new(wrong)).err().unwrap();
        assert!(err.to_string().contains("unknown format"), "got: {}", err);
        let zero = r#"{"format":"target-overlay","width":0,"height":1}"#;
        assert!(DetectionReader::open(Cursor::new(zero)).is_err());
    }

    #[test]
    fn test_read_all_skips_malformed() {
        let data = [header(), record(0.0, 1), "garbage".into(), String::new(), record(0.1, 2)].join("\n");
        let records = DetectionReader::open(Cursor::new(data)).unwrap().read_all();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].results[0].track_id, 2);
    }

    #[test]
    fn test_next_record_reports_line() {
        let data = [header(), "garbage".into()].join("\n");
        let mut reader = DetectionReader::open(Cursor::new(data)).unwrap();
        match reader.next_record() {
            Some(Err(ReplayError::Record { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected record error, got {:?}", other.map(|r| r.is_ok())),
        }
    }

    #[test]
    fn test_replay_into_channel() {
        let data = [header(), record(0.0, 1), r#"{"t":0.03,"results":[]}"#.into(), record(0.06, 1)].join("\n");
        let reader = DetectionReader::open(Cursor::new(data)).unwrap();
        let (tx, rx) = bounded(8);
        let shutdown = Arc::new(AtomicBool::new(false));
        assert_eq!(reader.replay(&tx, &shutdown, false), 3);
        let deliveries: Vec<Delivery> = rx.try_iter().collect();
        assert_eq!(deliveries.len(), 3);
        assert!(deliveries[1].results.is_empty());
        assert_eq!(deliveries[2].frame.height(), 48);
    }
}
