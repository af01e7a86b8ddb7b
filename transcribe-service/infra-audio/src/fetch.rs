use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;
use transcribe_domain::DomainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Remote(String),
    Local(PathBuf),
}

/// `http(s)://` sources are remote; everything else, with or without a
/// `file://` prefix, is a local path.
pub fn locate(source: &str) -> SourceLocation {
    let trimmed = source.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return SourceLocation::Remote(trimmed.to_string());
    }
    let path = trimmed.strip_prefix("file://").unwrap_or(trimmed);
    SourceLocation::Local(PathBuf::from(path))
}

pub fn scratch_file(temp_dir: Option<&Path>, suffix: &str) -> std::io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("transcribe-").suffix(suffix);
    match temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

pub async fn ensure_local(path: &Path) -> Result<(), DomainError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(DomainError::fetch(format!(
            "source is not a file: {}",
            path.display()
        ))),
        Err(err) => Err(DomainError::fetch(format!(
            "source not found: {}: {err}",
            path.display()
        ))),
    }
}

/// Streams the response body of `url` into a scratch file. Any transport error
/// or non-success status is a fetch failure.
pub async fn download(
    client: &reqwest::Client,
    url: &str,
    temp_dir: Option<&Path>,
) -> Result<TempPath, DomainError> {
    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|err| DomainError::fetch(format!("download of {url} failed: {err}")))?;

    let scratch = scratch_file(temp_dir, ".download")
        .map_err(|err| DomainError::internal_error(&format!("cannot create temp file: {err}")))?;
    let (file, path) = scratch.into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut bytes = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| DomainError::fetch(format!("download of {url} interrupted: {err}")))?
    {
        bytes += chunk.len();
        file.write_all(&chunk)
            .await
            .map_err(|err| DomainError::internal_error(&format!("cannot write temp file: {err}")))?;
    }
    file.flush()
        .await
        .map_err(|err| DomainError::internal_error(&format!("cannot write temp file: {err}")))?;

    if bytes == 0 {
        return Err(DomainError::fetch(format!("download of {url} returned no data")));
    }
    tracing::debug!(url = %url, bytes, "source downloaded");
    Ok(path)
}
