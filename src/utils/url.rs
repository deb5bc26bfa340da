// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Host (with port, if any) of a URL, e.g. `eos.example.edu:8443`.
pub fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    match url.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

/// Extract a numeric `id` query parameter from a URL.
///
/// The portal links user profiles as `.../user/profile.php?id=123`; the
/// numeric id is the stable account identifier.
pub fn extract_id_param(url: &str) -> Option<u64> {
    let parsed = Url::parse(url).ok()?;
    for (key, value) in parsed.query_pairs() {
        if key == "id" {
            return value.parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_with_port() {
        let url = Url::parse("https://eos.example.edu/index.php").unwrap();
        assert_eq!(host_with_port(&url), Some("eos.example.edu".to_string()));

        let url = Url::parse("http://localhost:8080/index.php").unwrap();
        assert_eq!(host_with_port(&url), Some("localhost:8080".to_string()));
    }

    #[test]
    fn test_extract_id_param() {
        assert_eq!(
            extract_id_param("https://eos.example.edu/user/profile.php?id=4711"),
            Some(4711)
        );
        assert_eq!(
            extract_id_param("https://eos.example.edu/user/profile.php?course=1"),
            None
        );
        assert_eq!(extract_id_param("not a url"), None);
    }
}
