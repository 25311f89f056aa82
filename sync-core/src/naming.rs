//! Transport-safe entry names.
//!
//! The server reserves `""`, `"."` and `".."`. A name that equals one of them
//! once trailing spaces are stripped gets one extra trailing space on the way
//! to the server, and loses one on the way back, so the mapping is exactly
//! invertible for every name.

/// Names the server refuses to store.
pub const RESERVED_SERVER_NAMES: [&str; 3] = ["", ".", ".."];

/// Placeholder name given to freshly created entries.
pub const DEFAULT_NAME_FOR_NEW_NODES: &str = " ";

/// Whether `name` is a reserved name followed by zero or more spaces.
pub fn is_server_illegal_after_trimming(name: &str) -> bool {
    let trimmed = name.trim_end_matches(' ');
    RESERVED_SERVER_NAMES.contains(&trimmed)
}

/// Map a caller-facing name to its transport form.
pub fn to_server_name(api_name: &str) -> String {
    let mut out = api_name.to_string();
    if is_server_illegal_after_trimming(&out) {
        out.push(' ');
    }
    out
}

/// Map a transport-form name back to the caller-facing name.
pub fn from_server_name(server_name: &str) -> String {
    if is_server_illegal_after_trimming(server_name) {
        if let Some(stripped) = server_name.strip_suffix(' ') {
            return stripped.to_string();
        }
    }
    server_name.to_string()
}
