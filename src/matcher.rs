//! Path-pattern matching.
//!
//! A pattern is a `/`-separated sequence of segments:
//!
//! - a literal (`users`) must equal the URL segment exactly, case-sensitive;
//! - a mandatory parameter (`:id`) binds whatever segment sits at that
//!   position, which must exist;
//! - an optional parameter (`[:id]`) binds the segment when present and
//!   forgives a URL that stops short.
//!
//! `/report/:year/[:month]/[:day]` therefore matches `/report/2024`,
//! `/report/2024/06` and `/report/2024/06/01`, binding one, two and three
//! parameters respectively.
//!
//! Matching is a pure function of its inputs — no state, no allocation
//! beyond the parameter map on success.

use std::collections::HashMap;

/// Matches `url_path` against `pattern`, stripping `root` first when one is
/// configured. `None` means no match; `Some` carries the bound parameters,
/// an empty map when the pattern has none.
///
/// A non-empty `root` must be a prefix of the URL — a URL outside the
/// mounted subtree never matches.
pub(crate) fn find(pattern: &str, url_path: &str, root: &str) -> Option<HashMap<String, String>> {
    let path = if root.is_empty() {
        url_path
    } else {
        url_path.strip_prefix(root)?
    };

    let url_bits: Vec<&str> = path.trim_matches('/').split('/').collect();
    let pattern_bits: Vec<&str> = pattern.trim_matches('/').split('/').collect();

    let mandatory = pattern_bits
        .iter()
        .filter(|bit| optional_name(bit).is_none())
        .count();

    if url_bits.len() < mandatory || url_bits.len() > pattern_bits.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pos, bit) in pattern_bits.iter().enumerate() {
        let Some(segment) = url_bits.get(pos) else {
            // URL exhausted: fine when the rest of the pattern is optional,
            // and the remaining parameters stay unbound.
            if optional_name(bit).is_some() {
                break;
            }
            return None;
        };

        if let Some(name) = mandatory_name(bit) {
            params.insert(name.to_owned(), (*segment).to_owned());
        } else if let Some(name) = optional_name(bit) {
            params.insert(name.to_owned(), (*segment).to_owned());
        } else if bit != segment {
            return None;
        }
    }

    Some(params)
}

fn mandatory_name(bit: &str) -> Option<&str> {
    bit.strip_prefix(':').filter(|name| !name.is_empty())
}

fn optional_name(bit: &str) -> Option<&str> {
    bit.strip_prefix("[:")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_patterns_match_exactly() {
        assert_eq!(find("/defined/route", "/defined/route", ""), Some(HashMap::new()));
        assert_eq!(find("/defined/route", "/undefined/route", ""), None);
        assert_eq!(find("/defined/route", "/Defined/Route", ""), None);
    }

    #[test]
    fn the_bare_root_path_matches_a_bare_pattern() {
        assert_eq!(find("/", "/", ""), Some(HashMap::new()));
        assert_eq!(find("/", "/anything", ""), None);
    }

    #[test]
    fn mandatory_parameters_bind_their_segment() {
        let params = find("/user/:name", "/user/alice", "").unwrap();
        assert_eq!(params.get("name").map(String::as_str), Some("alice"));
    }

    #[test]
    fn a_url_missing_a_mandatory_segment_never_matches() {
        assert!(find("/user/:name", "/user", "").is_none());
        assert!(find("/a/:b/:c", "/a/x", "").is_none());
    }

    #[test]
    fn a_url_longer_than_the_pattern_never_matches() {
        assert!(find("/user/:name", "/user/alice/extra", "").is_none());
        assert!(find("/a", "/a/b", "").is_none());
    }

    #[test]
    fn optional_parameters_bind_when_present() {
        let params = find("/a/[:b]/[:c]", "/a/x/y", "").unwrap();
        assert_eq!(params.get("b").map(String::as_str), Some("x"));
        assert_eq!(params.get("c").map(String::as_str), Some("y"));
    }

    #[test]
    fn absent_optional_parameters_stay_unbound() {
        let params = find("/a/[:b]/[:c]", "/a/x", "").unwrap();
        assert_eq!(params.get("b").map(String::as_str), Some("x"));
        assert!(!params.contains_key("c"));

        let params = find("/a/[:b]/[:c]", "/a", "").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn an_optional_segment_between_literals_is_not_skippable() {
        // The walk is positional: /a/c puts "c" in the optional slot and
        // then runs out of segments for the trailing literal.
        assert!(find("/a/[:b]/c", "/a/c", "").is_none());
        let params = find("/a/[:b]/c", "/a/x/c", "").unwrap();
        assert_eq!(params.get("b").map(String::as_str), Some("x"));
    }

    #[test]
    fn mixed_literal_and_parameter_segments() {
        let params = find("/url/param/:one", "/url/param/working", "").unwrap();
        assert_eq!(params.get("one").map(String::as_str), Some("working"));
        assert!(find("/url/param/:one", "/url/mismatch/working", "").is_none());
    }

    #[test]
    fn a_root_prefix_is_stripped_before_matching() {
        assert_eq!(find("/here", "/prefix/here", "/prefix"), Some(HashMap::new()));
    }

    #[test]
    fn a_url_outside_the_root_never_matches() {
        assert!(find("/here", "/here", "/prefix").is_none());
        assert!(find("/here", "/other/here", "/prefix").is_none());
    }

    #[test]
    fn trailing_slashes_are_ignored_on_both_sides() {
        assert_eq!(find("/defined/route/", "/defined/route", ""), Some(HashMap::new()));
        assert_eq!(find("/defined/route", "/defined/route/", ""), Some(HashMap::new()));
    }

    #[test]
    fn a_parameterless_match_yields_an_empty_map_not_nothing() {
        let params = find("/static", "/static", "").unwrap();
        assert!(params.is_empty());
    }
}
