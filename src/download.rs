use crate::error::{IoContext, KelpError, Result};
use crate::github::GitHubClient;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::ACCEPT;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Downloads `url` into `cache_path` unless a file by that name is already
/// cached. Returns the cached path.
pub async fn fetch_to_cache(client: &GitHubClient, url: &str, cache_path: &Path) -> Result<PathBuf> {
    if cache_path.is_file() {
        tracing::info!(
            "File {} already exists in cache, skipping download",
            cache_path.display()
        );
        return Ok(cache_path.to_path_buf());
    }
    download_file(client, url, cache_path).await?;
    Ok(cache_path.to_path_buf())
}

/// Streams `url` to `local_path` through a `.part` file that is renamed into
/// place only once the body is complete.
pub async fn download_file(client: &GitHubClient, url: &str, local_path: &Path) -> Result<()> {
    tracing::info!("Downloading {} to {}", url, local_path.display());

    let response = client
        .authorize(client.http().get(url))
        .header(ACCEPT, "application/octet-stream")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(KelpError::Http {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    let total_size = response.content_length().unwrap_or(0);
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let pb = ProgressBar::new(total_size);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("Downloading {}", filename));

    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    let part_path = part_path(local_path);
    let mut file = fs::File::create(&part_path).at(&part_path)?;

    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                pb.abandon();
                let _ = fs::remove_file(&part_path);
                return Err(e.into());
            }
        };
        file.write_all(&chunk).at(&part_path)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }
    file.flush().at(&part_path)?;
    drop(file);

    fs::rename(&part_path, local_path).at(local_path)?;
    pb.finish_with_message("Download complete");
    Ok(())
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}
