pub const FOLDER_ICON: &str = "image://theme/icon-m-folder";

/// Icons keyed by the MIME family (the part before `/`).
const MIME_FAMILY_ICONS: &[(&str, &str)] = &[
    ("image", "image://theme/icon-m-file-image"),
    ("audio", "image://theme/icon-m-file-audio"),
    ("video", "image://theme/icon-m-file-video"),
    ("text", "image://theme/icon-m-file-document"),
];

/// Icons for specific application types that deserve more than the generic icon.
const MIME_TYPE_ICONS: &[(&str, &str)] = &[
    ("application/pdf", "image://theme/icon-m-file-pdf"),
    ("application/zip", "image://theme/icon-m-file-archive"),
    ("application/x-tar", "image://theme/icon-m-file-archive"),
    ("application/gzip", "image://theme/icon-m-file-archive"),
];

const GENERIC_ICON: &str = "image://theme/icon-m-file-other";

/// Strip trailing separators so `/a/` and `/a` address the same entry. The root stays `/`.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() }
}

pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn mime_type_icon(mime_type: &str) -> &'static str {
    let lower = mime_type.to_ascii_lowercase();
    if let Some((_, icon)) = MIME_TYPE_ICONS.iter().find(|(mime, _)| *mime == lower) {
        return icon;
    }

    let family = lower.split('/').next().unwrap_or_default();
    MIME_FAMILY_ICONS
        .iter()
        .find(|(name, _)| *name == family)
        .map(|(_, icon)| *icon)
        .unwrap_or(GENERIC_ICON)
}
