//! DOT format utilities for graph visualization.
//!
//! The control-flow graph and the loop inclusion tree can both be dumped as DOT for
//! debugging; render the output with Graphviz.

/// Escapes a string for safe use in DOT labels and identifiers.
///
/// Quotes, backslashes, newlines and angle brackets are escaped; carriage returns
/// are dropped.
///
/// # Examples
///
/// ```rust
/// use qpuc::utils::escape_dot;
///
/// assert_eq!(escape_dot("%x = load <4 x i32>"), "%x = load \\<4 x i32\\>");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}
