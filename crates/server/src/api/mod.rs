//! HTTP handlers for the admin surface.

pub mod health;
pub mod log_rules;
pub mod math_rules;

/// Parse a raw query string into pairs, supporting repeated keys (which
/// the standard `Query` extractor cannot deserialize into a `Vec`).
pub(crate) fn query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Minimal application/x-www-form-urlencoded decoding: `+` becomes a
/// space and `%XX` bytes are resolved. Malformed escapes pass through.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match (hex_val(bytes.get(i + 1)), hex_val(bytes.get(i + 2))) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: Option<&u8>) -> Option<u8> {
    match b? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_keys() {
        let pairs = query_pairs("id=1&id=2&updater=ops");
        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "1".to_string()),
                ("id".to_string(), "2".to_string()),
                ("updater".to_string(), "ops".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_escapes() {
        let pairs = query_pairs("updater=zhang%20san&note=a+b");
        assert_eq!(pairs[0].1, "zhang san");
        assert_eq!(pairs[1].1, "a b");
    }

    #[test]
    fn tolerates_malformed_escape() {
        let pairs = query_pairs("x=%zz");
        assert_eq!(pairs[0].1, "%zz");
    }

    #[test]
    fn empty_query_is_empty() {
        assert!(query_pairs("").is_empty());
    }
}
