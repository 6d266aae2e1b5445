//! Stable error codes for build execution.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// The resolved configuration could not be loaded.
pub const BUILD_CONFIG_INVALID: &str = "BUILD_CONFIG_INVALID";

/// An import specifier did not resolve to a file.
pub const BUILD_RESOLVE_FAILED: &str = "BUILD_RESOLVE_FAILED";

/// A source file could not be read.
pub const BUILD_READ_FAILED: &str = "BUILD_READ_FAILED";

/// A script transform failed.
pub const BUILD_TRANSFORM_FAILED: &str = "BUILD_TRANSFORM_FAILED";

/// lightningcss rejected a stylesheet.
pub const BUILD_CSS_FAILED: &str = "BUILD_CSS_FAILED";

/// grass rejected a Sass source.
pub const BUILD_SASS_FAILED: &str = "BUILD_SASS_FAILED";

/// No rule matched a file and the unmatched policy is `reject`.
pub const BUILD_UNMATCHED_FILE: &str = "BUILD_UNMATCHED_FILE";

/// Writing the output tree failed.
pub const BUILD_EMIT_FAILED: &str = "BUILD_EMIT_FAILED";

/// Two outputs with different content rendered to the same file name.
pub const BUILD_OUTPUT_CONFLICT: &str = "BUILD_OUTPUT_CONFLICT";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let codes = [
            BUILD_CONFIG_INVALID,
            BUILD_RESOLVE_FAILED,
            BUILD_READ_FAILED,
            BUILD_TRANSFORM_FAILED,
            BUILD_CSS_FAILED,
            BUILD_SASS_FAILED,
            BUILD_UNMATCHED_FILE,
            BUILD_EMIT_FAILED,
            BUILD_OUTPUT_CONFLICT,
        ];

        for code in codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
