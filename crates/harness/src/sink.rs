// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Output sink: persistent log file plus in-memory accumulation.
//!
//! One sink is created per spawned command. It appends every raw byte read
//! from the child to the suite log file and keeps the same bytes in memory,
//! decoded lossily on demand for failure messages.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct OutputSink {
    file: BufWriter<File>,
    raw: Vec<u8>,
}

impl OutputSink {
    /// Open the suite log for appending and write the spawn header:
    /// `-- Executing '<command line>' --` followed by a blank line.
    pub fn open(log_path: &Path, command_line: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        let mut file = BufWriter::new(file);
        writeln!(file, "-- Executing '{}' --\n", command_line)?;
        file.flush()?;

        Ok(Self {
            file,
            raw: Vec::new(),
        })
    }

    /// Record a chunk of raw output: append to the log file and the
    /// in-memory accumulation.
    pub fn record(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.file.write_all(chunk)?;
        self.file.flush()?;
        self.raw.extend_from_slice(chunk);
        Ok(())
    }

    /// All bytes recorded so far, in arrival order.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The recorded output decoded as text. Invalid UTF-8 (split escape
    /// sequences, binary noise) is replaced, never an error.
    pub fn logged(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
