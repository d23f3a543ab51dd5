// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use tempfile::TempDir;

#[test]
fn header_is_written_on_open() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("integration.log");

    let _sink = OutputSink::open(&log, "build/cli auth --username test").unwrap();

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        contents,
        "-- Executing 'build/cli auth --username test' --\n\n"
    );
}

#[test]
fn record_appends_to_file_and_memory() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("integration.log");

    let mut sink = OutputSink::open(&log, "cmd").unwrap();
    sink.record(b"username: ").unwrap();
    sink.record(b"password: ").unwrap();

    assert_eq!(sink.raw(), b"username: password: ");
    assert_eq!(sink.logged(), "username: password: ");

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.ends_with("username: password: "));
}

#[test]
fn consecutive_sinks_append_to_the_same_log() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("integration.log");

    let mut first = OutputSink::open(&log, "cmd one").unwrap();
    first.record(b"alpha\n").unwrap();
    drop(first);

    let mut second = OutputSink::open(&log, "cmd two").unwrap();
    second.record(b"beta\n").unwrap();
    drop(second);

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        contents,
        "-- Executing 'cmd one' --\n\nalpha\n-- Executing 'cmd two' --\n\nbeta\n"
    );
}

#[test]
fn invalid_utf8_decodes_lossily() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("integration.log");

    let mut sink = OutputSink::open(&log, "cmd").unwrap();
    sink.record(b"ok \xff\xfe done").unwrap();

    // The raw bytes are preserved; the decoded view replaces the noise.
    assert_eq!(sink.raw(), b"ok \xff\xfe done");
    assert_eq!(sink.logged(), "ok \u{fffd}\u{fffd} done");
}

#[test]
fn in_memory_accumulation_excludes_the_header() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("integration.log");

    let mut sink = OutputSink::open(&log, "cmd").unwrap();
    sink.record(b"output only").unwrap();

    assert_eq!(sink.logged(), "output only");
}
