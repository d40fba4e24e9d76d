//! Local-disk object storage adapter. The distilled spec treats object
//! storage as an interface ("local disk or S3-like"); this is the
//! local-disk implementation, laid out exactly per §6's "Persisted state
//! layout" note.

use std::path::{Path, PathBuf};

use ecto_domain::config::Config;
use ecto_domain::{EctoError, Result};
use uuid::Uuid;

pub const ICON_MAX_BYTES: i64 = 2 * 1024 * 1024;
pub const BANNER_MAX_BYTES: i64 = 800 * 1024;
pub const WEBHOOK_BODY_MAX_BYTES: usize = 1024 * 1024;

fn sanitize_filename(filename: &str) -> String {
    let name = Path::new(filename).file_name().and_then(|f| f.to_str()).unwrap_or("file");
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' }).collect()
}

async fn write_file(config: &Config, rel_path: &Path, bytes: &[u8]) -> Result<()> {
    let full_path = PathBuf::from(&config.upload_dir).join(rel_path);
    if let Some(parent) = full_path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| EctoError::Storage(e.to_string()))?;
    }
    tokio::fs::write(&full_path, bytes).await.map_err(|e| EctoError::Storage(e.to_string()))?;
    Ok(())
}

/// Saves a channel-attachment upload, returning the `url` to store on the
/// `attachments` row (the path the `/files/...` handler will later serve).
pub async fn save_channel_attachment(
    config: &Config,
    server_id: Uuid,
    channel_id: Uuid,
    attachment_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    let safe_name = sanitize_filename(filename);
    let rel = PathBuf::from(server_id.to_string()).join(channel_id.to_string()).join(attachment_id.to_string()).join(&safe_name);
    write_file(config, &rel, bytes).await?;
    Ok(format!("/files/{}", rel.to_string_lossy().replace('\\', "/")))
}

pub async fn save_shared_file(
    config: &Config,
    server_id: Uuid,
    folder_id: Option<Uuid>,
    file_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    let safe_name = sanitize_filename(filename);
    let folder_segment = folder_id.map(|f| f.to_string()).unwrap_or_else(|| "root".to_string());
    let rel = PathBuf::from(server_id.to_string()).join("shared").join(folder_segment).join(file_id.to_string()).join(&safe_name);
    write_file(config, &rel, bytes).await?;
    Ok(format!("/files/{}", rel.to_string_lossy().replace('\\', "/")))
}

pub async fn save_dm_attachment(
    config: &Config,
    server_id: Uuid,
    conversation_id: Uuid,
    attachment_id: Uuid,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    // DM attachments share the channel-attachment layout — a DM conversation
    // is itself a `channel_id` in the messages table.
    save_channel_attachment(config, server_id, conversation_id, attachment_id, filename, bytes).await
}

pub enum ImageKind {
    Icon,
    Banner,
    PageBanner,
}

impl ImageKind {
    fn dir_name(&self) -> &'static str {
        match self {
            ImageKind::Icon => "icons",
            ImageKind::Banner => "banners",
            ImageKind::PageBanner => "page-banners",
        }
    }

    pub fn max_bytes(&self) -> i64 {
        match self {
            ImageKind::Icon => ICON_MAX_BYTES,
            ImageKind::Banner | ImageKind::PageBanner => BANNER_MAX_BYTES,
        }
    }
}

pub async fn save_image(config: &Config, server_id: Uuid, kind: ImageKind, filename: &str, bytes: &[u8]) -> Result<String> {
    let safe_name = format!("{}-{}", Uuid::now_v7(), sanitize_filename(filename));
    let rel = PathBuf::from(server_id.to_string()).join(kind.dir_name()).join(&safe_name);
    write_file(config, &rel, bytes).await?;
    Ok(format!("/files/{}", rel.to_string_lossy().replace('\\', "/")))
}

/// Reads stored bytes back for the `GET /files/...` handler. `rel_path` is
/// the part of the request path after `/files/`, already validated to
/// contain no `..` segments by the caller.
pub async fn read_file(config: &Config, rel_path: &str) -> Result<Vec<u8>> {
    if rel_path.split('/').any(|seg| seg == "..") {
        return Err(EctoError::validation(ecto_domain::error::codes::VALIDATION, "invalid path"));
    }
    let full_path = PathBuf::from(&config.upload_dir).join(rel_path);
    tokio::fs::read(&full_path).await.map_err(|_| EctoError::not_found(ecto_domain::error::codes::VALIDATION, "file not found"))
}

/// Removes the on-disk file backing a stored `url` (as produced by the
/// `save_*` functions above, `/files/{rel_path}`). Best-effort: a row whose
/// file was already missing on disk shouldn't block the DB delete.
pub async fn delete_by_url(config: &Config, url: &str) {
    let Some(rel_path) = url.strip_prefix("/files/") else { return };
    let full_path = PathBuf::from(&config.upload_dir).join(rel_path);
    let _ = tokio::fs::remove_file(&full_path).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_path_separators_and_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my file!@#.png"), "my_file___.png");
    }

    #[test]
    fn sanitize_falls_back_to_file_for_empty_name() {
        assert_eq!(sanitize_filename(""), "file");
    }

    fn test_config(upload_dir: &str) -> Config {
        Config {
            database_url: None,
            database_type: ecto_domain::config::DatabaseBackend::Sqlite,
            database_path: "data/test.db".into(),
            jwt_secret: "test".into(),
            central_url: None,
            port: 8080,
            mediasoup_min_port: 40000,
            mediasoup_max_port: 49999,
            upload_dir: upload_dir.to_string(),
            server_address: None,
            hosting_mode: ecto_domain::config::HostingMode::SelfHosted,
            allow_local_accounts: true,
            storage_quota_bytes: 0,
            max_upload_size_bytes: 0,
        }
    }

    #[tokio::test]
    async fn channel_attachment_round_trips_through_read_file() {
        let dir = std::env::temp_dir().join(format!("ecto-upload-test-{}", Uuid::now_v7()));
        let config = test_config(dir.to_str().unwrap());

        let server_id = Uuid::now_v7();
        let channel_id = Uuid::now_v7();
        let attachment_id = Uuid::now_v7();
        let url = save_channel_attachment(&config, server_id, channel_id, attachment_id, "cat.png", b"meow").await.unwrap();

        let rel_path = url.strip_prefix("/files/").unwrap();
        let read_back = read_file(&config, rel_path).await.unwrap();
        assert_eq!(read_back, b"meow");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn read_file_rejects_path_traversal() {
        let dir = std::env::temp_dir().join(format!("ecto-upload-test-{}", Uuid::now_v7()));
        let config = test_config(dir.to_str().unwrap());
        let result = read_file(&config, "../../etc/passwd").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_by_url_removes_the_file() {
        let dir = std::env::temp_dir().join(format!("ecto-upload-test-{}", Uuid::now_v7()));
        let config = test_config(dir.to_str().unwrap());
        let server_id = Uuid::now_v7();
        let file_id = Uuid::now_v7();
        let url = save_shared_file(&config, server_id, None, file_id, "notes.txt", b"hi").await.unwrap();

        delete_by_url(&config, &url).await;

        let rel_path = url.strip_prefix("/files/").unwrap();
        assert!(read_file(&config, rel_path).await.is_err());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
