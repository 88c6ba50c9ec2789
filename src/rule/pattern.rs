//! Case-insensitive regular expression matching against transaction text.
//!
//! Patterns use "contains" semantics: `starbucks` matches `"STARBUCKS #123"`
//! without needing to be anchored or wrapped in `.*`. The `regex` crate runs
//! in linear time, so user supplied patterns cannot trigger catastrophic
//! backtracking.

use regex::{Regex, RegexBuilder};

/// Upper bound on the compiled size of a single pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Compile `pattern` as a case-insensitive regular expression.
///
/// # Errors
/// Returns the [regex::Error] if `pattern` is not a valid regular expression
/// or compiles to a program larger than the size limit.
pub fn compile_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
}

/// Check whether `pattern` is found anywhere in `text`, ignoring case.
///
/// Returns `false` if either `text` or `pattern` is absent. A pattern that
/// fails to compile is logged and treated as not matching.
pub fn pattern_matches(text: Option<&str>, pattern: Option<&str>) -> bool {
    let (Some(text), Some(pattern)) = (text, pattern) else {
        return false;
    };

    match compile_pattern(pattern) {
        Ok(regex) => regex.is_match(text),
        Err(error) => {
            tracing::warn!("Skipping pattern {pattern:?} that could not be compiled: {error}");
            false
        }
    }
}

/// Find the first part of `text` matched by `pattern`, ignoring case.
///
/// # Errors
/// Returns the [regex::Error] if `pattern` cannot be compiled.
pub fn find_match<'t>(text: &'t str, pattern: &str) -> Result<Option<&'t str>, regex::Error> {
    let regex = compile_pattern(pattern)?;

    Ok(regex.find(text).map(|found| found.as_str()))
}
