use std::path::Path;

use anyhow::{anyhow, Result};

/// Infer a MIME content type from a file extension. The platform keys
/// encode targets and grant headers off the content type, so unknown
/// extensions are an error rather than a guess.
pub fn content_type_for_path(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| anyhow!("File has no extension: {}", path.display()))?;

    let content_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        other => return Err(anyhow!("Unsupported file extension: {}", other)),
    };
    Ok(content_type.to_string())
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn content_type_known_extensions() {
        assert_eq!(
            content_type_for_path(&PathBuf::from("a/photo.JPG")).unwrap(),
            "image/jpeg"
        );
        assert_eq!(
            content_type_for_path(&PathBuf::from("clip.mp4")).unwrap(),
            "video/mp4"
        );
    }

    #[test]
    fn content_type_rejects_unknown() {
        assert!(content_type_for_path(&PathBuf::from("notes.txt")).is_err());
        assert!(content_type_for_path(&PathBuf::from("no_extension")).is_err());
    }
}
