//! Slug derivation for aggregate entity ids
//!
//! Aggregate ids must be a deterministic function of the grouping key so
//! that repeated rebuilds address the same records.

/// Slugify a grouping key: lowercase, alphanumerics kept, everything else
/// collapsed into single hyphens, no leading/trailing hyphen.
pub fn slugify(key: &str) -> String {
    let mut slug = String::with_capacity(key.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen

    for c in key.chars() {
        if c.is_alphanumeric() {
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }

    slug
}

/// Deterministic aggregate entity id for a grouping key
pub fn aggregate_id(prefix: &str, key: &str) -> String {
    format!("{}-{}", prefix, slugify(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("AI"), "ai");
        assert_eq!(slugify("Rust Patterns"), "rust-patterns");
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn test_slugify_collapses_separators() {
        assert_eq!(slugify("a  --  b"), "a-b");
        assert_eq!(slugify("  trimmed  "), "trimmed");
    }

    #[test]
    fn test_slugify_unicode() {
        assert_eq!(slugify("Café Culture"), "café-culture");
    }

    #[test]
    fn test_slugify_empty_and_symbols() {
        assert_eq!(slugify(""), "");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_aggregate_id() {
        assert_eq!(aggregate_id("series", "AI"), "series-ai");
        assert_eq!(aggregate_id("agg", "Rust Patterns"), "agg-rust-patterns");
    }

    #[test]
    fn test_aggregate_id_is_stable() {
        assert_eq!(aggregate_id("series", "AI"), aggregate_id("series", "AI"));
    }
}
