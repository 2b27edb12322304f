//! Path utilities for safe filesystem operations.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything except ASCII alphanumerics, `-` and `_` gets percent-encoded.
const WORKSPACE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Turn a repository identifier into a single directory name.
///
/// The mapping is injective, so two identifiers never share a workspace, and the result
/// contains no separators or dots, so it can never escape the workspace root.
///
/// ```ignore
/// // This is an internal utility function
/// assert_eq!(workspace_dir_name("platform/external/libc"), "platform%2Fexternal%2Flibc");
/// assert_eq!(workspace_dir_name("../etc"), "%2E%2E%2Fetc");
/// ```
#[must_use]
pub fn workspace_dir_name(id: &str) -> String {
    if id.is_empty() {
        return "%".to_string();
    }

    utf8_percent_encode(id, WORKSPACE_NAME_SET).to_string()
}
