//! Mapping incoming file names to destination tables.
//!
//! "No match" is an ignorable outcome, never an error: files this system
//! does not manage simply pass through.

use std::path::Path;

/// Exact matches on the lowercased file stem.
const STEM_TABLES: &[(&str, &str)] = &[
    ("ip_location_results", "ip_locations"),
    ("product_ids_to_crawl", "product_ids_to_crawl"),
    ("valid_product_ids", "crawl_product_id"),
];

/// Substring matches over the whole object name, in priority order.
const KEYWORD_TABLES: &[(&str, &str)] = &[
    ("ip_location", "ip_locations"),
    ("product_ids_to_crawl", "product_ids_to_crawl"),
    ("valid_product_ids", "crawl_product_id"),
];

/// Resolve an object name by its exact stem: take the base name, strip the
/// extension, lowercase, and look it up.
pub(crate) fn exact_stem(object_name: &str) -> Option<&'static str> {
    let stem = Path::new(object_name.trim())
        .file_stem()?
        .to_str()?
        .trim()
        .to_lowercase();
    STEM_TABLES
        .iter()
        .find(|&&(known, _)| stem == known)
        .map(|&(_, table)| table)
}

/// Resolve an object name by scanning for the first known keyword that
/// appears anywhere in it.
pub(crate) fn substring(object_name: &str) -> Option<&'static str> {
    KEYWORD_TABLES
        .iter()
        .find(|&&(keyword, _)| object_name.contains(keyword))
        .map(|&(_, table)| table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn exact_stem_matches_the_three_exports() {
        assert_eq!(exact_stem("ip_location_results.jsonl"), Some("ip_locations"));
        assert_eq!(
            exact_stem("dataset_export/product_ids_to_crawl.jsonl"),
            Some("product_ids_to_crawl"),
        );
        assert_eq!(exact_stem("valid_product_ids.jsonl"), Some("crawl_product_id"));
    }

    #[test]
    fn exact_stem_normalizes_case_and_whitespace() {
        assert_eq!(exact_stem(" IP_Location_Results.JSONL "), Some("ip_locations"));
        assert_eq!(exact_stem("valid_product_ids"), Some("crawl_product_id"));
    }

    #[test]
    fn exact_stem_requires_the_whole_stem() {
        assert_eq!(exact_stem("old_ip_location_results.jsonl"), None);
        assert_eq!(exact_stem("ip_location.jsonl"), None);
        assert_eq!(exact_stem("notes.txt"), None);
    }

    #[test]
    fn substring_matches_anywhere_in_the_object_name() {
        assert_eq!(
            substring("dataset_export/ip_location_results.jsonl"),
            Some("ip_locations"),
        );
        assert_eq!(
            substring("backup/2025/valid_product_ids-retry.jsonl"),
            Some("crawl_product_id"),
        );
        assert_eq!(
            substring("product_ids_to_crawl_v2.jsonl"),
            Some("product_ids_to_crawl"),
        );
    }

    #[test]
    fn substring_ignores_unrelated_objects() {
        assert_eq!(substring("orders_2025.jsonl"), None);
    }

    #[test]
    fn substring_priority_is_first_listed_wins() {
        assert_eq!(
            substring("ip_location_and_valid_product_ids.jsonl"),
            Some("ip_locations"),
        );
    }
}
