//! Unit tests for URL normalization and /:param patterns

use mock_relay::pattern::{segment_count, strip_query};
use mock_relay::PathPattern;
use pretty_assertions::assert_eq;

#[test]
fn test_strip_query_stops_at_query_or_fragment() {
    assert_eq!(strip_query("https://a/b?x=1"), "https://a/b");
    assert_eq!(strip_query("https://a/b#frag"), "https://a/b");
    assert_eq!(strip_query("https://a/b"), "https://a/b");
}

#[test]
fn test_scheme_separator_is_a_plain_segment_boundary() {
    // `https://a/b` and `https:-a-b` style URLs bucket identically.
    assert_eq!(segment_count("https://a/b"), 3);
    assert_eq!(segment_count("https://a/b/"), 3);
    assert_eq!(segment_count("a/b/c"), 3);
}

#[test]
fn test_multiple_params_in_one_pattern() {
    let pattern = PathPattern::compile("https://a/:kind/:id/detail");
    assert!(pattern.matches("https://a/goals/7/detail"));
    assert!(pattern.matches("https://a/posts/abc/detail?x=1"));
    assert!(!pattern.matches("https://a/goals/7/summary"));
}

#[test]
fn test_segment_count_mismatch_never_matches() {
    let pattern = PathPattern::compile("https://a/goals/:id");
    assert!(!pattern.matches("https://a/goals"));
    assert!(!pattern.matches("https://a/goals/7/extra"));
}

#[test]
fn test_raw_pattern_text_is_preserved() {
    let pattern = PathPattern::compile("https://a/goals/:id");
    assert_eq!(pattern.raw(), "https://a/goals/:id");
    assert_eq!(pattern.segment_count(), 4);
}
