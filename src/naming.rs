//! Output naming conventions.
//!
//! Part names follow `<base>_parte_<index>[_<token>].<ext>` with a 1-based
//! index, and the archive is named `<base>_dividido[_<token>].zip`. These
//! patterns are kept stable for compatibility with existing consumers.

/// Returns the file name without its final extension.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    }
}

/// Returns the lowercased final extension, including the leading dot.
pub fn extension(file_name: &str) -> Option<String> {
    match file_name.rfind('.') {
        Some(0) | None => None,
        Some(idx) if idx + 1 == file_name.len() => None,
        Some(idx) => Some(file_name[idx..].to_ascii_lowercase()),
    }
}

/// Builds the name for one output part. `index` is 1-based.
pub fn partition_file_name(
    base: &str,
    index: usize,
    token: Option<&str>,
    extension: &str,
) -> String {
    match token {
        Some(token) => format!("{}_parte_{}_{}.{}", base, index, token, extension),
        None => format!("{}_parte_{}.{}", base, index, extension),
    }
}

/// Builds the suggested download name for the archive.
pub fn archive_file_name(base: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!("{}_dividido_{}.zip", base, token),
        None => format!("{}_dividido.zip", base),
    }
}
