// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental pattern matching over a child's live output.
//!
//! [`Expector`] keeps a cursor marking how much of the output has already
//! been matched. Each `expect` scans only unconsumed bytes, so consecutive
//! expectations never re-match output an earlier one consumed. Matching
//! happens as chunks arrive; it never needs the stream to finish first.

use std::ops::Range;
use std::time::Duration;

use crate::child::{ChildProcess, ReadOutcome, READ_PATIENCE};
use crate::error::HarnessError;

/// A compiled expect pattern.
///
/// Both forms run on raw bytes, so output that is not valid UTF-8 (split
/// escape sequences, binary noise) can still be matched through.
pub struct Matcher {
    regex: regex::bytes::Regex,
    source: String,
}

impl Matcher {
    /// Compile a regular-expression pattern.
    pub fn regex(pattern: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            regex: regex::bytes::Regex::new(pattern)?,
            source: pattern.to_string(),
        })
    }

    /// Compile a literal pattern; the text is matched exactly as written.
    pub fn exact(literal: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            regex: regex::bytes::Regex::new(&regex::escape(literal))?,
            source: literal.to_string(),
        })
    }

    /// The pattern as the test wrote it, for failure messages.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Leftmost match in `haystack`, if any.
    pub fn find(&self, haystack: &[u8]) -> Option<Range<usize>> {
        self.regex.find(haystack).map(|m| m.range())
    }
}

/// Cursor state for one spawned child. Created fresh per spawn.
#[derive(Debug, Default)]
pub struct Expector {
    cursor: usize,
}

impl Expector {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many output bytes have been consumed by matches so far.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Pure match step: search the unconsumed region of `output` and, on a
    /// hit, advance the cursor past the match. Returns the matched range in
    /// absolute output coordinates. The cursor never rewinds.
    pub fn scan(&mut self, output: &[u8], matcher: &Matcher) -> Option<Range<usize>> {
        let unconsumed = output.get(self.cursor..)?;
        let found = matcher.find(unconsumed)?;
        let range = self.cursor + found.start..self.cursor + found.end;
        self.cursor = range.end;
        Some(range)
    }

    /// Block until `matcher` matches unconsumed output, up to `limit`.
    ///
    /// End of stream before a match terminates the child and fails with
    /// [`HarnessError::Eof`]; an elapsed bound terminates the child and
    /// fails with [`HarnessError::Timeout`]. Either way the failure carries
    /// the full accumulated output, and the caller can never observe a
    /// failed expect with the child still alive.
    pub async fn expect(
        &mut self,
        child: &mut ChildProcess,
        matcher: &Matcher,
        limit: Duration,
    ) -> Result<Range<usize>, HarnessError> {
        let deadline = tokio::time::Instant::now() + limit;

        loop {
            if let Some(range) = self.scan(child.output(), matcher) {
                return Ok(range);
            }
            if tokio::time::Instant::now() >= deadline {
                child.terminate().await?;
                return Err(HarnessError::Timeout {
                    operation: format!("expecting {:?}", matcher.source()),
                    output: child.logged(),
                });
            }
            match child.read_chunk(READ_PATIENCE).await? {
                ReadOutcome::Eof => {
                    // Check the unconsumed tail once more before giving up.
                    if let Some(range) = self.scan(child.output(), matcher) {
                        return Ok(range);
                    }
                    child.terminate().await?;
                    return Err(HarnessError::Eof {
                        pattern: matcher.source().to_string(),
                        output: child.logged(),
                    });
                }
                ReadOutcome::Data(_) | ReadOutcome::Idle => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "expect_tests.rs"]
mod tests;
