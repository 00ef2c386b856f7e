// URL normalization and /:param pattern matching for dynamic mocks

/// Strip the query string (and fragment) from a URL
pub fn strip_query(url: &str) -> &str {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    &url[..end]
}

/// Split a URL into comparable segments
///
/// The scheme separator is flattened into a plain segment boundary, so
/// `https://a/b` and the pattern `https://a/:id` bucket and compare the
/// same way.
fn segments(url: &str) -> Vec<&str> {
    strip_query(url)
        .split("://")
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Segment count of a URL, used as the dynamic-index bucket key
///
/// Bucketing by count is an optimization only; candidates in the same
/// bucket are still rejected by the matcher when they do not apply.
pub fn segment_count(url: &str) -> usize {
    segments(url).len()
}

/// A compiled `/:param` URL pattern
///
/// `:name` segments match any single non-empty segment; everything else
/// matches literally.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Param,
}

impl PathPattern {
    /// Compile a pattern string
    pub fn compile(pattern: &str) -> Self {
        let parts = segments(pattern)
            .into_iter()
            .map(|segment| {
                if segment.starts_with(':') {
                    Part::Param
                } else {
                    Part::Literal(segment.to_string())
                }
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            parts,
        }
    }

    /// The pattern as written
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Number of segments, for bucket placement
    pub fn segment_count(&self) -> usize {
        self.parts.len()
    }

    /// Whether a concrete URL matches this pattern
    pub fn matches(&self, url: &str) -> bool {
        let segments = segments(url);
        if segments.len() != self.parts.len() {
            return false;
        }
        self.parts
            .iter()
            .zip(segments)
            .all(|(part, segment)| match part {
                Part::Literal(literal) => literal == segment,
                Part::Param => true,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_query() {
        assert_eq!(
            strip_query("https://a/b?x=1&y=2"),
            "https://a/b"
        );
        assert_eq!(strip_query("https://a/b"), "https://a/b");
        assert_eq!(strip_query("https://a/b#frag"), "https://a/b");
    }

    #[test]
    fn test_segment_count_flattens_scheme() {
        assert_eq!(segment_count("https://api.example.com/goals"), 3);
        assert_eq!(segment_count("https://api.example.com/goals/12?x=1"), 4);
    }

    #[test]
    fn test_param_segments_match_anything_nonempty() {
        let pattern = PathPattern::compile("https://api.example.com/goals/:id");
        assert!(pattern.matches("https://api.example.com/goals/12"));
        assert!(pattern.matches("https://api.example.com/goals/abc?x=1"));
        assert!(!pattern.matches("https://api.example.com/goals"));
        assert!(!pattern.matches("https://api.example.com/tasks/12"));
        assert!(!pattern.matches("https://api.example.com/goals/12/edit"));
    }

    #[test]
    fn test_same_bucket_non_match_is_rejected() {
        // Same segment count, different literal: the bucket optimization
        // must not make this match.
        let pattern = PathPattern::compile("https://a/users/:id");
        assert_eq!(pattern.segment_count(), segment_count("https://a/goals/7"));
        assert!(!pattern.matches("https://a/goals/7"));
    }
}
