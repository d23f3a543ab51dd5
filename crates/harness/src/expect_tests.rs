// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use proptest::prelude::*;
use rstest::rstest;

#[test]
fn exact_matches_literally() {
    let matcher = Matcher::exact("1.2.3").unwrap();
    assert_eq!(matcher.find(b"version 1.2.3 ready"), Some(8..13));
    // The dots are not regex wildcards.
    assert_eq!(matcher.find(b"version 1x2y3 ready"), None);
}

#[test]
fn regex_matches_patterns() {
    let matcher = Matcher::regex(r"version \d+\.\d+\.\d+").unwrap();
    assert_eq!(matcher.find(b"cli version 10.2.33\n"), Some(4..19));
}

#[test]
fn invalid_regex_is_a_pattern_error() {
    match Matcher::regex("(unclosed") {
        Err(HarnessError::Pattern(_)) => {}
        other => panic!("expected Pattern error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn matching_works_on_invalid_utf8() {
    let matcher = Matcher::exact("ready").unwrap();
    let stream = b"\xff\x1b[31mready\x1b[0m";
    assert_eq!(matcher.find(stream), Some(6..11));
}

#[rstest]
#[case(b"username: ".as_slice(), "username:", Some(0..9))]
#[case(b"... username: ".as_slice(), "username:", Some(4..13))]
#[case(b"password: ".as_slice(), "username:", None)]
fn scan_finds_leftmost(
    #[case] output: &[u8],
    #[case] pattern: &str,
    #[case] expected: Option<std::ops::Range<usize>>,
) {
    let matcher = Matcher::exact(pattern).unwrap();
    let mut expector = Expector::new();
    assert_eq!(expector.scan(output, &matcher), expected);
}

#[test]
fn earliest_starting_match_wins() {
    let matcher = Matcher::regex("ab|b").unwrap();
    let mut expector = Expector::new();
    // "b" alone appears earlier inside "ab"; leftmost start wins, and the
    // alternation order picks "ab" at that position.
    assert_eq!(expector.scan(b"xxab", &matcher), Some(2..4));
}

#[test]
fn cursor_advances_past_the_match() {
    let matcher = Matcher::exact("go").unwrap();
    let mut expector = Expector::new();

    let output = b"go go go";
    assert_eq!(expector.scan(output, &matcher), Some(0..2));
    assert_eq!(expector.cursor(), 2);
    assert_eq!(expector.scan(output, &matcher), Some(3..5));
    assert_eq!(expector.scan(output, &matcher), Some(6..8));
    assert_eq!(expector.scan(output, &matcher), None);
}

#[test]
fn consumed_output_is_never_rematched() {
    let matcher = Matcher::exact("token").unwrap();
    let mut expector = Expector::new();

    let output = b"token once";
    assert!(expector.scan(output, &matcher).is_some());
    // The same bytes again: no second match, even though the pattern is
    // still present before the cursor.
    assert_eq!(expector.scan(output, &matcher), None);
}

#[test]
fn scan_sees_bytes_appended_after_a_miss() {
    let matcher = Matcher::exact("prompt>").unwrap();
    let mut expector = Expector::new();

    let mut output: Vec<u8> = b"booting...".to_vec();
    assert_eq!(expector.scan(&output, &matcher), None);

    output.extend_from_slice(b"\nprompt>");
    assert_eq!(expector.scan(&output, &matcher), Some(11..18));
}

#[test]
fn match_split_across_chunks_is_found() {
    let matcher = Matcher::exact("username:").unwrap();
    let mut expector = Expector::new();

    let mut output: Vec<u8> = b"user".to_vec();
    assert_eq!(expector.scan(&output, &matcher), None);
    // A miss must not consume the partial prefix.
    assert_eq!(expector.cursor(), 0);

    output.extend_from_slice(b"name:");
    assert_eq!(expector.scan(&output, &matcher), Some(0..9));
}

proptest! {
    /// Any needle placed verbatim in the stream is found, and the cursor
    /// lands strictly after its last byte.
    #[test]
    fn needle_in_stream_is_found(
        prefix in "[a-z \n]{0,40}",
        needle in "[A-Z]{1,10}",
        suffix in "[a-z \n]{0,40}",
    ) {
        let matcher = Matcher::exact(&needle).unwrap();
        let mut expector = Expector::new();

        let output = format!("{prefix}{needle}{suffix}");
        let range = expector.scan(output.as_bytes(), &matcher).unwrap();

        prop_assert_eq!(&output.as_bytes()[range.clone()], needle.as_bytes());
        prop_assert_eq!(expector.cursor(), range.end);
    }

    /// The cursor is monotonic over any sequence of scans.
    #[test]
    fn cursor_is_monotonic(
        chunks in proptest::collection::vec("[a-z:]{0,10}", 1..10),
        pattern in "[a-z]{1,3}",
    ) {
        let matcher = Matcher::exact(&pattern).unwrap();
        let mut expector = Expector::new();

        let mut output: Vec<u8> = Vec::new();
        let mut last_cursor = 0;
        for chunk in &chunks {
            output.extend_from_slice(chunk.as_bytes());
            expector.scan(&output, &matcher);
            prop_assert!(expector.cursor() >= last_cursor);
            prop_assert!(expector.cursor() <= output.len());
            last_cursor = expector.cursor();
        }
    }
}
