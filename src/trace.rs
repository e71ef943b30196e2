// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! File-access trace replay.
//!
//! A trace is a text file with one event per line:
//!
//! ```text
//! /data/a.bin,O        # open
//! /data/a.bin,R,4096   # read, reporting the file's current size
//! ```
//!
//! Blank lines and `#` comments are ignored. The event tag may be quoted.
//!
//! # Example
//!
//! ```
//! use evict_engine::{trace, CacheEngine, EngineConfig};
//!
//! let engine = CacheEngine::new(EngineConfig {
//!     cache_size: 100,
//!     background_evictor: false,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let input = "a,O\na,R,50\nb,O\nb,R,60\n";
//! let stats = trace::replay(&engine, input.as_bytes()).unwrap();
//! assert_eq!((stats.opens, stats.reads, stats.skipped), (2, 2, 0));
//! assert!(engine.resident_bytes() <= 80);
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::coordinator::{CacheEngine, EngineError};

/// One trace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Open { path: String },
    Read { path: String, size: u64 },
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("empty path")]
    EmptyPath,
    #[error("missing event tag")]
    MissingTag,
    #[error("read event without a size")]
    MissingSize,
    #[error("invalid read size '{value}'")]
    InvalidSize { value: String },
    #[error("unknown event tag '{tag}'")]
    UnknownEvent { tag: String },
    #[error("trace I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Totals from one [`replay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub opens: u64,
    pub reads: u64,
    /// Malformed or unknown lines
    pub skipped: u64,
    /// Bytes reclaimed by sweeps the reads triggered
    pub freed_bytes: u64,
}

/// Parse one trace line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<TraceEvent>, TraceError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut fields = line.split(',').map(str::trim);
    let path = fields.next().unwrap_or("");
    if path.is_empty() {
        return Err(TraceError::EmptyPath);
    }

    let tag = fields
        .next()
        .map(|tag| tag.trim_matches('"'))
        .filter(|tag| !tag.is_empty())
        .ok_or(TraceError::MissingTag)?;

    match tag {
        "O" => Ok(Some(TraceEvent::Open {
            path: path.to_owned(),
        })),
        "R" => {
            let raw = fields.next().ok_or(TraceError::MissingSize)?;
            let size = raw.parse::<u64>().map_err(|_| TraceError::InvalidSize {
                value: raw.to_owned(),
            })?;
            Ok(Some(TraceEvent::Read {
                path: path.to_owned(),
                size,
            }))
        }
        other => Err(TraceError::UnknownEvent {
            tag: other.to_owned(),
        }),
    }
}

/// Feed every event from `reader` into `engine`.
///
/// Lines that don't parse are logged and skipped. I/O and engine errors
/// stop the replay.
pub fn replay<R: BufRead>(engine: &CacheEngine, reader: R) -> Result<ReplayStats, TraceError> {
    let mut stats = ReplayStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping trace line");
                stats.skipped += 1;
                continue;
            }
        };

        match event {
            TraceEvent::Open { path } => {
                engine.open(&path)?;
                stats.opens += 1;
            }
            TraceEvent::Read { path, size } => {
                stats.freed_bytes = stats.freed_bytes.saturating_add(engine.read(&path, size)?);
                stats.reads += 1;
            }
        }
    }

    info!(
        opens = stats.opens,
        reads = stats.reads,
        skipped = stats.skipped,
        freed = stats.freed_bytes,
        "Trace replayed"
    );
    Ok(stats)
}

/// [`replay`] the trace file at `path`.
pub fn replay_file(engine: &CacheEngine, path: impl AsRef<Path>) -> Result<ReplayStats, TraceError> {
    let file = File::open(path)?;
    replay(engine, BufReader::new(file))
}
