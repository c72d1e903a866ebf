use sha2::{Digest, Sha256};

/// Short, stable hash of `input` used for content-addressed names.
pub fn content_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

/// Normalize a URL-derived path: collapse `//`, `.` and `..`, sanitize each
/// segment, and keep a trailing `/` when the input had one.
///
/// `..` never climbs above the first segment, so the result stays inside
/// whatever folder it is joined to.
pub fn normalize_path(input: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for raw in input.split('/') {
        match raw {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => {
                let cleaned = sanitize_segment(segment);
                if !cleaned.is_empty() {
                    segments.push(cleaned);
                }
            }
        }
    }
    let mut normalized = segments.join("/");
    if input.ends_with('/') && !normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// URL-safe tag slug: lowercase alphanumerics separated by single dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut prev_dash = true;
    for c in input.trim().chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn sanitize_segment(input: &str) -> String {
    let mut cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    cleaned = cleaned.trim_matches(&['_', ' '][..]).to_string();
    // Collapse multiple underscores
    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::{content_hash, normalize_path, slugify};

    #[test]
    fn hash_is_stable_and_distinct() {
        let a = content_hash("https://example.com/?v=1");
        assert_eq!(a, content_hash("https://example.com/?v=1"));
        assert_ne!(a, content_hash("https://example.com/?v=2"));
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn normalize_collapses_and_keeps_trailing_slash() {
        assert_eq!(normalize_path("/blog//2024/./post/"), "blog/2024/post/");
        assert_eq!(normalize_path("/a/b/../c"), "a/c");
        assert_eq!(normalize_path("/../../etc/passwd"), "etc/passwd");
        assert_eq!(normalize_path("/watch:now"), "watch_now");
        assert_eq!(normalize_path("/con/"), "con_/");
        assert_eq!(normalize_path("/"), "");
    }

    #[test]
    fn slugify_tags() {
        assert_eq!(slugify("Rust Lang"), "rust-lang");
        assert_eq!(slugify("  C++ & Friends!  "), "c-friends");
        assert_eq!(slugify("Déjà vu"), "déjà-vu");
    }
}
