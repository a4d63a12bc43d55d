use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tar::Archive;
use walkdir::WalkDir;

pub async fn download_file(url: &str, local_path: &Path) -> Result<()> {
    let filename = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| url.to_string());
    tracing::info!("Downloading '{}' to '{}'...", url, local_path.display());

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(anyhow!(
            "Download of {} failed with status {}",
            url,
            response.status()
        ));
    }
    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", filename));

    let mut file = fs::File::create(local_path)?;
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    use futures_util::StreamExt;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    pb.finish_with_message("Download complete");
    Ok(())
}

/// Whether `path` names an archive [`extract_archive`] can unpack.
pub fn is_archive(path: &Path) -> bool {
    let name = path.to_string_lossy().to_lowercase();
    [".zip", ".tar.gz", ".tgz", ".tar.xz"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

pub fn extract_archive(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    tracing::info!(
        "Extracting {} to {}...",
        archive_path.display(),
        extract_dir.display()
    );
    fs::create_dir_all(extract_dir)?;

    let name = archive_path.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
        extract_zip(archive_path, extract_dir)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive_path, extract_dir)
    } else if name.ends_with(".tar.xz") {
        extract_tar_xz(archive_path, extract_dir)
    } else {
        Err(anyhow!(
            "Unsupported archive format: {}",
            archive_path.display()
        ))
    }
}

pub fn extract_zip(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!("Skipping malicious path in zip: {}", file.name());
            continue;
        };
        let outpath = extract_dir.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = fs::File::create(&outpath)?;
            io::copy(&mut file, &mut outfile)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = file.unix_mode() {
                    fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
                }
            }
        }
    }

    Ok(())
}

fn extract_tar_gz(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    archive.unpack(extract_dir)?;

    Ok(())
}

fn extract_tar_xz(archive_path: &Path, extract_dir: &Path) -> Result<()> {
    let file = fs::File::open(archive_path)?;
    let decoder = xz2::read::XzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    archive.unpack(extract_dir)?;

    Ok(())
}

/// Recursively copy the content of `src_dir` into `dst_dir`, creating it.
pub fn copy_dir_all(src_dir: &Path, dst_dir: &Path) -> Result<u64> {
    let mut copied = 0u64;
    fs::create_dir_all(dst_dir)?;

    for entry in WalkDir::new(src_dir).min_depth(1) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(src_dir)?;
        let target = dst_dir.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Could not copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            copied += 1;
        }
    }

    tracing::debug!(
        "Copied {} files from {} to {}",
        copied,
        src_dir.display(),
        dst_dir.display()
    );
    Ok(copied)
}

/// Remove a file or directory; a missing path is not an error.
pub fn remove_path(path: &Path) -> Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("Skipping already deleted '{}'", path.display());
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        tracing::debug!("rmtree('{}')", path.display());
        fs::remove_dir_all(path)
    } else {
        tracing::debug!("unlink('{}')", path.display());
        fs::remove_file(path)
    }
    .with_context(|| format!("Could not remove {}", path.display()))?;
    Ok(true)
}
