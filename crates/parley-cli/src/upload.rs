//! Turning local files into message attachments.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use parley_client::Attachment;

/// Read `path` and wrap it as an attachment carrying a `data:` URL.
pub async fn read_attachment(path: &Path) -> std::io::Result<Attachment> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    Ok(attachment(name, &bytes))
}

/// Build an attachment named `name` whose data is `bytes` as a base64 `data:` URL.
pub fn attachment(name: String, bytes: &[u8]) -> Attachment {
    let data = format!("data:{};base64,{}", media_type(&name), STANDARD.encode(bytes));
    Attachment { name, data }
}

fn media_type(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_type_and_content() {
        let file = attachment("Cat.PNG".to_string(), b"hi!");
        assert_eq!(file.name, "Cat.PNG");
        assert_eq!(file.data, "data:image/png;base64,aGkh");
    }

    #[test]
    fn unknown_extensions_are_opaque_bytes() {
        let empty = attachment("notes".to_string(), &[]);
        assert_eq!(empty.data, "data:application/octet-stream;base64,");
        assert_eq!(media_type("archive.tar.zst"), "application/octet-stream");
    }

    #[tokio::test]
    async fn reads_file_by_path() {
        let path = std::env::temp_dir().join(format!("parley-upload-{}.txt", std::process::id()));
        tokio::fs::write(&path, b"hello").await.unwrap();

        let file = read_attachment(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(file.name, path.file_name().unwrap().to_string_lossy());
        assert_eq!(file.data, "data:text/plain;base64,aGVsbG8=");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("parley-upload-does-not-exist.bin");
        assert!(read_attachment(&missing).await.is_err());
    }
}
