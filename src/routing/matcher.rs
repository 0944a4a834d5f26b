//! Route template matching.
//!
//! # Responsibilities
//! - Normalize request paths and route templates
//! - Match a template such as `/api/users/:id` against a concrete path
//! - Extract `:param` segments as URL-decoded bindings
//!
//! # Design Decisions
//! - Segment counts must be equal (no catch-all or greedy segments)
//! - Static segments compare case-sensitively
//! - No regex to guarantee O(n) matching in the number of segments

use std::collections::HashMap;

/// Parameters extracted from a matched path, keyed by name without `:`.
pub type PathParams = HashMap<String, String>;

/// Collapse repeated `/`, strip a trailing `/`, and ensure a leading `/`.
///
/// The root path and the empty string both sanitize to `/`.
pub fn sanitize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments(path) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// True when the template contains at least one `:param` segment.
pub fn is_template(path: &str) -> bool {
    segments(path).any(|s| s.starts_with(':'))
}

/// Parameter names declared by a template, in order.
pub fn param_names(template: &str) -> Vec<&str> {
    segments(template)
        .filter_map(|s| s.strip_prefix(':'))
        .collect()
}

/// Match `template` against `path`, returning the extracted parameters.
pub fn match_path(template: &str, path: &str) -> Option<PathParams> {
    let template_parts: Vec<&str> = segments(template).collect();
    let path_parts: Vec<&str> = segments(path).collect();

    if template_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = PathParams::new();
    for (pattern, actual) in template_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = pattern.strip_prefix(':') {
            params.insert(name.to_string(), decode_segment(actual));
        } else if pattern != actual {
            return None;
        }
    }

    Some(params)
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-decode a segment; malformed encodings are kept verbatim.
fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/api/users/"), "/api/users");
        assert_eq!(sanitize_path("//api///users"), "/api/users");
        assert_eq!(sanitize_path("api/users"), "/api/users");
        assert_eq!(sanitize_path("/"), "/");
        assert_eq!(sanitize_path(""), "/");
        assert_eq!(sanitize_path("///"), "/");
    }

    #[test]
    fn test_match_static() {
        assert_eq!(match_path("/api/users", "/api/users"), Some(PathParams::new()));
        assert_eq!(match_path("/api/users", "/api/posts"), None);
        assert_eq!(match_path("/", "/"), Some(PathParams::new()));
    }

    #[test]
    fn test_match_with_param() {
        let params = match_path("/api/users/:id", "/api/users/123").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("123"));
    }

    #[test]
    fn test_segment_count_must_match() {
        assert_eq!(match_path("/api/users/:id", "/api/users/123/extra"), None);
        assert_eq!(match_path("/api/users/:id", "/api/users"), None);
    }

    #[test]
    fn test_multiple_params() {
        let params = match_path("/posts/:postId/comments/:commentId", "/posts/7/comments/42").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["postId"], "7");
        assert_eq!(params["commentId"], "42");
    }

    #[test]
    fn test_params_are_url_decoded() {
        let params = match_path("/files/:name", "/files/hello%20world.txt").unwrap();
        assert_eq!(params["name"], "hello world.txt");

        // Invalid UTF-8 after decoding stays as written
        let params = match_path("/files/:name", "/files/%FF").unwrap();
        assert_eq!(params["name"], "%FF");
    }

    #[test]
    fn test_static_segments_are_case_sensitive() {
        assert_eq!(match_path("/api/Users", "/api/users"), None);
    }

    #[test]
    fn test_template_helpers() {
        assert!(is_template("/a/:id"));
        assert!(!is_template("/a/b"));
        assert_eq!(param_names("/a/:x/b/:y"), vec!["x", "y"]);
    }
}
