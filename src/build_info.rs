//! Build metadata injected by `build.rs`, surfaced in startup logs and
//! `--version` output.

/// Short git commit hash this binary was built from, or `"unknown"`.
pub const GIT_HASH: &str = env!("NOCTANE_BUILD_GIT_HASH");
/// UTC build timestamp, or a `unix:<epoch>` fallback if `date` is unavailable.
pub const BUILD_TIMESTAMP: &str = env!("NOCTANE_BUILD_TIMESTAMP");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_non_empty() {
        assert!(!GIT_HASH.is_empty());
        assert!(!BUILD_TIMESTAMP.is_empty());
    }
}
