//! Status-code resolution against OpenAPI response maps.
//!
//! Response maps are keyed by exact codes (`"200"`), range patterns
//! (`"1XX"`–`"5XX"`), or `"default"`. Exact keys outrank patterns, patterns
//! outrank `default`. Key order matters for the representative-response
//! fallback, so maps are [`IndexMap`]s.

use indexmap::IndexMap;

/// Resolve a numeric status code against a keyed response map.
///
/// Lookup order: exact key, then the `NXX` pattern for the code's class,
/// then `default`. A code outside 100–599 has no class, so it skips both
/// the exact and pattern branches and only `default` can match. Presence of
/// a key is what matters; an explicit `null` value is still a match.
pub fn find_status_code_match<V>(code: u16, map: &IndexMap<String, V>) -> Option<&V> {
    if (100..=599).contains(&code) {
        if let Some(v) = map.get(code.to_string().as_str()) {
            return Some(v);
        }
        if let Some(v) = map.get(format!("{}XX", code / 100).as_str()) {
            return Some(v);
        }
    }
    map.get("default")
}

/// Choose a representative response for mocking.
///
/// Preference: the numerically lowest exact 2xx key, then `"2XX"`, then
/// `"default"`, then the first key in insertion order. The returned status
/// is the key's numeric value; `"2XX"` and `"default"` map to 200, other
/// pattern keys to `N * 100`.
pub fn find_default_status_code_match<V>(map: &IndexMap<String, V>) -> Option<(u16, &V)> {
    let lowest_2xx = map
        .iter()
        .filter_map(|(k, v)| k.parse::<u16>().ok().map(|c| (c, v)))
        .filter(|(c, _)| (200..300).contains(c))
        .min_by_key(|(c, _)| *c);
    if let Some(found) = lowest_2xx {
        return Some(found);
    }
    if let Some(v) = map.get("2XX") {
        return Some((200, v));
    }
    if let Some(v) = map.get("default") {
        return Some((200, v));
    }
    map.iter().next().map(|(k, v)| (key_to_status(k), v))
}

fn key_to_status(key: &str) -> u16 {
    if let Ok(code) = key.parse::<u16>() {
        return code;
    }
    key.strip_suffix("XX")
        .and_then(|class| class.parse::<u16>().ok())
        .map_or(200, |class| class * 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn response_map(pairs: &[(&str, &str)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    #[test]
    fn test_exact_beats_pattern_and_default() {
        let map = response_map(&[
            ("200", "OK"),
            ("401", "U"),
            ("4XX", "E"),
            ("400", "B"),
            ("default", "D"),
        ]);
        assert_eq!(find_status_code_match(400, &map), Some(&json!("B")));
        assert_eq!(find_status_code_match(403, &map), Some(&json!("E")));
        assert_eq!(find_status_code_match(402, &map), Some(&json!("E")));
        assert_eq!(find_status_code_match(500, &map), Some(&json!("D")));
    }

    #[test]
    fn test_out_of_range_code_falls_to_default() {
        let map = response_map(&[("0XX", "zero"), ("default", "D")]);
        assert_eq!(find_status_code_match(42, &map), Some(&json!("D")));
        assert_eq!(find_status_code_match(600, &map), Some(&json!("D")));
    }

    #[test]
    fn test_no_match_returns_none() {
        let map = response_map(&[("200", "OK")]);
        assert_eq!(find_status_code_match(404, &map), None);
    }

    #[test]
    fn test_explicit_null_value_still_matches() {
        let mut map = IndexMap::new();
        map.insert("204".to_string(), Value::Null);
        assert_eq!(find_status_code_match(204, &map), Some(&Value::Null));
    }

    #[test]
    fn test_default_match_prefers_lowest_2xx() {
        let map = response_map(&[("404", "nf"), ("201", "created"), ("200", "ok")]);
        let (status, res) = find_default_status_code_match(&map).unwrap();
        assert_eq!(status, 200);
        assert_eq!(res, &json!("ok"));
    }

    #[test]
    fn test_default_match_2xx_pattern_then_default() {
        let map = response_map(&[("404", "nf"), ("2XX", "ok-ish")]);
        assert_eq!(
            find_default_status_code_match(&map),
            Some((200, &json!("ok-ish")))
        );

        let map = response_map(&[("404", "nf"), ("default", "D")]);
        assert_eq!(find_default_status_code_match(&map), Some((200, &json!("D"))));
    }

    #[test]
    fn test_default_match_falls_back_to_first_key() {
        let map = response_map(&[("404", "nf"), ("500", "err")]);
        assert_eq!(
            find_default_status_code_match(&map),
            Some((404, &json!("nf")))
        );

        let map = response_map(&[("4XX", "client")]);
        assert_eq!(
            find_default_status_code_match(&map),
            Some((400, &json!("client")))
        );
    }

    #[test]
    fn test_default_match_empty_map() {
        let map: IndexMap<String, Value> = IndexMap::new();
        assert_eq!(find_default_status_code_match(&map), None);
    }
}
