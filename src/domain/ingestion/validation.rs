//! Validation helpers for ingestion

/// Whether an upload's declared content type is CSV (case-insensitive)
pub fn is_csv_mime(mime: &str) -> bool {
    mime.to_lowercase().contains("text/csv")
}

/// Reduce an uploaded file name to a safe single path component
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned.to_string()
    }
}
