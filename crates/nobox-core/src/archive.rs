//! Archive stage: fetch → extract → relocate → cleanup.
//!
//! Each operation consumes what the previous one produced:
//!
//! ```text
//! fetch(url)            -> TempArchive
//! extract(&TempArchive) -> ExtractedRoot
//! relocate(ExtractedRoot, target)
//! cleanup(TempArchive)
//! ```
//!
//! [`stage`] runs the chain and always calls `cleanup` once a temporary file
//! may exist, whether or not the later operations succeeded.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;

use crate::config::ArchiveConfig;
use crate::error::{NoboxError, Result};

/// Name prefix of the per-run extraction directory.
pub const STAGING_PREFIX: &str = ".nobox-extract-";

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Downloads archive bytes to a local file.
#[allow(async_fn_in_trait)]
pub trait ArchiveFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Fetches `http(s)://` urls with reqwest and copies `file://` urls from disk.
#[derive(Debug, Clone, Default)]
pub struct UrlFetcher {
    client: reqwest::Client,
}

impl UrlFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArchiveFetcher for UrlFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(local) = url.strip_prefix("file://") {
            tracing::debug!(source = local, "copying local archive");
            std::fs::copy(local, dest).map_err(|e| NoboxError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            return Ok(());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NoboxError::UnsupportedUrl(url.to_string()));
        }

        tracing::debug!(url, "downloading archive");
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        let mut file = File::create(dest)?;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)?;
        }
        file.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chain types
// ---------------------------------------------------------------------------

/// A downloaded archive on disk. Only [`cleanup`] consumes it.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The folder the archive unpacked to, before it is renamed. Lives inside a
/// private staging directory that is removed when this value is dropped.
#[derive(Debug)]
pub struct ExtractedRoot {
    path: PathBuf,
    _staging: TempDir,
}

impl ExtractedRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Download `url` to `temp_path`. A partial file left by a failed download is
/// removed before the error is returned.
pub async fn fetch<F: ArchiveFetcher>(
    fetcher: &F,
    url: &str,
    temp_path: PathBuf,
) -> Result<TempArchive> {
    match fetcher.fetch(url, &temp_path).await {
        Ok(()) => Ok(TempArchive { path: temp_path }),
        Err(e) => {
            cleanup(TempArchive { path: temp_path })?;
            Err(e)
        }
    }
}

/// Unpack a gzipped tarball into a fresh staging directory under
/// `destination_root`. Returns the expected top-level folder; its presence is
/// checked by [`relocate`]. Nothing already in `destination_root` is touched.
pub fn extract(
    archive: &TempArchive,
    destination_root: &Path,
    root_folder: &str,
) -> Result<ExtractedRoot> {
    let extract_err = |reason: String| NoboxError::Extract {
        path: archive.path.clone(),
        reason,
    };
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(destination_root)?;
    let file = File::open(&archive.path).map_err(|e| extract_err(e.to_string()))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball
        .unpack(staging.path())
        .map_err(|e| extract_err(e.to_string()))?;

    tracing::debug!(staging = %staging.path().display(), "archive extracted");
    Ok(ExtractedRoot {
        path: staging.path().join(root_folder),
        _staging: staging,
    })
}

/// Rename the extracted folder to `target`. Fails if the archive did not
/// contain the expected folder. The staging directory and anything else the
/// archive held are removed either way.
pub fn relocate(root: ExtractedRoot, target: &Path) -> Result<PathBuf> {
    if !root.path.is_dir() {
        let expected = root.path.file_name().map(PathBuf::from).unwrap_or_default();
        return Err(NoboxError::ExtractedRootMissing(expected));
    }
    std::fs::rename(&root.path, target)?;
    Ok(target.to_path_buf())
}

/// Make the archive writable and delete it. A file that is already gone is
/// not an error.
pub fn cleanup(archive: TempArchive) -> Result<()> {
    let path = archive.path;
    match std::fs::metadata(&path) {
        Ok(meta) => {
            let mut perms = meta.permissions();
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                perms.set_mode(0o666);
            }
            #[cfg(not(unix))]
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            if let Err(e) = std::fs::set_permissions(&path, perms) {
                tracing::debug!("could not relax permissions on {}: {e}", path.display());
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    }
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Run the whole chain: the project tree ends up at `target` and the
/// temporary archive is gone, on success and on failure.
pub async fn stage<F: ArchiveFetcher>(
    fetcher: &F,
    settings: &ArchiveConfig,
    temp_path: PathBuf,
    destination_root: &Path,
    target: &Path,
) -> Result<PathBuf> {
    println!("Downloading {} ...", settings.url);
    let archive = fetch(fetcher, &settings.url, temp_path).await?;

    println!("Extracting repository...");
    let placed = extract(&archive, destination_root, &settings.root_folder)
        .and_then(|root| relocate(root, target));

    let cleaned = cleanup(archive);
    let placed = placed?;
    cleaned?;
    Ok(placed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{tar_gz, FakeFetcher};
    use tempfile::TempDir;

    fn settings() -> ArchiveConfig {
        ArchiveConfig {
            url: "https://example.test/master.tar.gz".to_string(),
            root_folder: "laravel-master".to_string(),
            template: "laravel".to_string(),
        }
    }

    fn staging_dirs(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(STAGING_PREFIX))
            })
            .collect()
    }

    fn leftover_archives(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().ends_with(".tar.gz"))
            .collect()
    }

    #[tokio::test]
    async fn stage_places_tree_and_removes_archive() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(tar_gz(&[
            ("laravel-master/artisan", "#!/usr/bin/env php"),
            ("laravel-master/app/Http/Kernel.php", "<?php"),
        ]));
        let temp = dir.path().join("nobox-laravel_1.tar.gz");
        let target = dir.path().join("demo");

        let placed = stage(&fetcher, &settings(), temp.clone(), dir.path(), &target)
            .await
            .unwrap();

        assert_eq!(placed, target);
        assert!(target.join("artisan").is_file());
        assert!(target.join("app/Http/Kernel.php").is_file());
        assert!(!dir.path().join("laravel-master").exists());
        assert!(staging_dirs(dir.path()).is_empty());
        assert!(!temp.exists());
        assert_eq!(
            fetcher.urls.borrow().as_slice(),
            ["https://example.test/master.tar.gz"]
        );
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_partial_file() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::failing();
        let temp = dir.path().join("nobox-laravel_2.tar.gz");

        let err = stage(
            &fetcher,
            &settings(),
            temp.clone(),
            dir.path(),
            &dir.path().join("demo"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NoboxError::Fetch { .. }));
        assert!(!temp.exists());
        assert!(!dir.path().join("demo").exists());
    }

    #[tokio::test]
    async fn unexpected_root_folder_fails_loudly_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(tar_gz(&[("laravel-main/artisan", "php")]));
        let temp = dir.path().join("nobox-laravel_3.tar.gz");

        let err = stage(
            &fetcher,
            &settings(),
            temp.clone(),
            dir.path(),
            &dir.path().join("demo"),
        )
        .await
        .unwrap_err();

        match err {
            NoboxError::ExtractedRootMissing(path) => {
                assert_eq!(path, PathBuf::from("laravel-master"));
            }
            other => panic!("expected ExtractedRootMissing, got {other:?}"),
        }
        assert!(!temp.exists());
        assert!(!dir.path().join("demo").exists());
        assert!(!dir.path().join("laravel-main").exists());
        assert!(staging_dirs(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn existing_folder_with_root_name_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let own = dir.path().join("laravel-master");
        std::fs::create_dir(&own).unwrap();
        std::fs::write(own.join("mine.txt"), "operator data").unwrap();
        std::fs::write(own.join("artisan"), "operator artisan").unwrap();
        let fetcher = FakeFetcher::serving(tar_gz(&[("laravel-master/artisan", "template")]));
        let target = dir.path().join("demo");

        stage(
            &fetcher,
            &settings(),
            dir.path().join("nobox-laravel_5.tar.gz"),
            dir.path(),
            &target,
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read_to_string(own.join("mine.txt")).unwrap(), "operator data");
        assert_eq!(
            std::fs::read_to_string(own.join("artisan")).unwrap(),
            "operator artisan"
        );
        assert_eq!(std::fs::read_to_string(target.join("artisan")).unwrap(), "template");
        assert!(!target.join("mine.txt").exists());
        assert!(staging_dirs(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn corrupt_archive_is_an_extract_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = FakeFetcher::serving(b"not a tarball".to_vec());

        let err = stage(
            &fetcher,
            &settings(),
            dir.path().join("nobox-laravel_4.tar.gz"),
            dir.path(),
            &dir.path().join("demo"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, NoboxError::Extract { .. }));
        assert!(leftover_archives(dir.path()).is_empty());
        assert!(staging_dirs(dir.path()).is_empty());
    }

    #[test]
    fn cleanup_removes_read_only_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.tar.gz");
        std::fs::write(&path, b"data").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        std::fs::set_permissions(&path, perms).unwrap();

        cleanup(TempArchive { path: path.clone() }).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn cleanup_of_missing_file_is_ok() {
        let dir = TempDir::new().unwrap();
        cleanup(TempArchive {
            path: dir.path().join("gone.tar.gz"),
        })
        .unwrap();
    }

    #[tokio::test]
    async fn url_fetcher_copies_file_urls() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("template.tar.gz");
        std::fs::write(&source, b"bytes").unwrap();
        let dest = dir.path().join("copy.tar.gz");

        UrlFetcher::new()
            .fetch(&format!("file://{}", source.display()), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn url_fetcher_rejects_unknown_schemes() {
        let dir = TempDir::new().unwrap();
        let err = UrlFetcher::new()
            .fetch("ftp://example.test/a.tar.gz", &dir.path().join("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, NoboxError::UnsupportedUrl(_)));
    }
}
