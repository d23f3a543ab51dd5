// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Build metadata of the binary under test.
//!
//! Version and update scenarios assert against the version, channel, and
//! build number the tested binary was built with. Those values live in a
//! JSON artifact generated by its build; the harness only reads it.

use std::path::Path;

use serde::Deserialize;

use crate::error::HarnessError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BuildMetadata {
    pub version: String,
    pub channel: String,
    pub build_number: String,
}

impl BuildMetadata {
    /// Load the artifact from disk.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
