// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Optional plain-text eviction log.
//!
//! Each eviction appends one line to a file. The sink is best-effort: a file
//! that can't be opened disables it, and write failures are reported once
//! through `tracing` and counted, never returned to the caller.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::warn;

use crate::bucket::Tier;
use crate::entry::Entry;

#[derive(Debug)]
pub struct EvictionLog {
    sink: Option<Mutex<LineWriter<File>>>,
    write_failed: AtomicBool,
}

impl EvictionLog {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            sink: None,
            write_failed: AtomicBool::new(false),
        }
    }

    /// Open `path` for appending. Falls back to a disabled log on failure.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                sink: Some(Mutex::new(LineWriter::new(file))),
                write_failed: AtomicBool::new(false),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Eviction log unavailable, continuing without it");
                Self::disabled()
            }
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn record_eviction(&self, tier: Tier, entry: &Entry) {
        self.line(format_args!(
            "From {} evict {} ({} bytes)",
            tier,
            entry.path(),
            entry.size()
        ));
    }

    pub fn line(&self, message: std::fmt::Arguments<'_>) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = writeln!(sink.lock(), "{}", message) {
            crate::metrics::record_log_error();
            if !self.write_failed.swap(true, Ordering::Relaxed) {
                warn!(error = %e, "Eviction log write failed");
            }
        }
    }
}
