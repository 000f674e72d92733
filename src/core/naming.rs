//! Generated names: workload names, image tags, user components

use rand::Rng;

/// `len` random lowercase ASCII letters
pub fn random_lowercase(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

/// Name for a workload when the caller gave none
pub fn generate_workload_name() -> String {
    format!("workload-{}", random_lowercase(8))
}

/// Reduce a user name to something valid in an image repository path.
///
/// Lower-cases, maps anything outside `[a-z0-9._-]` to `-` and trims
/// separators from both ends. Falls back to `unknown`.
pub fn sanitize_user(user: &str) -> String {
    let mapped: String = user
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = mapped.trim_matches(|c| matches!(c, '.' | '_' | '-'));
    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `$USER`, sanitized
pub fn current_user() -> String {
    sanitize_user(&std::env::var("USER").unwrap_or_default())
}
