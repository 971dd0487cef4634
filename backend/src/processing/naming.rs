//! Upload name cleanup and the output-name rule shared by the batch
//! processor and the listing view.

use unicode_normalization::UnicodeNormalization;

const WINDOWS_DEVICE_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// `"{stem}_{label}{ext}"`, splitting on the last dot of `original_name`.
pub fn derive_output_name(original_name: &str, label: &str) -> String {
    let (stem, ext) = split_extension(original_name);
    format!("{}_{}{}", stem, label, ext)
}

/// Splits off the extension at the last dot. Leading dots belong to the stem,
/// so `.hidden` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if name[..idx].chars().any(|c| c != '.') => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Reduces a client-supplied filename to a safe, flat ASCII name.
///
/// Accented letters are decomposed first so `café` keeps its `e`. On Windows,
/// reserved device names get a `_` prefix. The result may be empty; callers
/// still process the upload under that name.
pub fn sanitize_filename(raw: &str) -> String {
    let last_component = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let ascii: String = last_component.nfkd().filter(char::is_ascii).collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    let name = kept.trim_matches(|c| c == '.' || c == '_').to_string();

    if cfg!(windows) && is_device_name(&name) {
        format!("_{}", name)
    } else {
        name
    }
}

fn is_device_name(name: &str) -> bool {
    let device = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
    !name.is_empty() && WINDOWS_DEVICE_NAMES.contains(&device.as_str())
}
