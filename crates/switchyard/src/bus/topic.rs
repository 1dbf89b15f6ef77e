//! Topic-exchange pattern matching.

/// Returns `true` when `routing_key` matches the binding `pattern`.
///
/// Both are dot-delimited. In the pattern `*` matches exactly one segment
/// and `#` matches zero or more segments; any other segment must match
/// literally.
///
/// # Examples
///
/// ```rust
/// use switchyard::bus::topic_matches;
///
/// assert!(topic_matches("simple.*", "simple.add"));
/// assert!(topic_matches("jobs.#", "jobs"));
/// assert!(!topic_matches("simple.*", "simple.math.add"));
/// ```
#[must_use]
pub fn topic_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let key_segments: Vec<&str> = routing_key.split('.').collect();
    segments_match(&pattern_segments, &key_segments)
}

fn segments_match(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => {
            segments_match(rest, key)
                || key
                    .split_first()
                    .is_some_and(|(_, tail)| segments_match(pattern, tail))
        }
        Some((&"*", rest)) => key
            .split_first()
            .is_some_and(|(_, tail)| segments_match(rest, tail)),
        Some((word, rest)) => key
            .split_first()
            .is_some_and(|(segment, tail)| segment == word && segments_match(rest, tail)),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::topic_matches;

    #[rstest]
    #[case::literal("svc.jobs.add", "svc.jobs.add", true)]
    #[case::literal_mismatch("svc.jobs.add", "svc.jobs.sub", false)]
    #[case::star_one_segment("simple.*", "simple.add", true)]
    #[case::star_not_zero("simple.*", "simple", false)]
    #[case::star_not_two("simple.*", "simple.math.add", false)]
    #[case::hash_zero("jobs.#", "jobs", true)]
    #[case::hash_many("jobs.#", "jobs.a.b.c", true)]
    #[case::hash_middle("svc.#.add", "svc.add", true)]
    #[case::hash_middle_many("svc.#.add", "svc.x.y.add", true)]
    #[case::hash_middle_mismatch("svc.#.add", "svc.x.y.sub", false)]
    #[case::hash_alone("#", "anything.at.all", true)]
    #[case::star_prefix("*.add", "calc.add", true)]
    #[case::longer_key("svc", "svc.add", false)]
    fn matches_topic_patterns(#[case] pattern: &str, #[case] key: &str, #[case] expected: bool) {
        assert_eq!(topic_matches(pattern, key), expected, "{pattern} vs {key}");
    }
}
