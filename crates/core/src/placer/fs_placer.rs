//! File system placer implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};

use super::config::PlacerConfig;
use super::error::PlacerError;
use super::traits::Placer;
use super::types::{ChecksumType, FilePlacement, ImportMethod, PlacedFile};

/// Streaming digest for either checksum type.
enum Digester {
    Sha256(Sha256),
    Md5(md5::Context),
}

impl Digester {
    fn new(checksum_type: ChecksumType) -> Self {
        match checksum_type {
            ChecksumType::Sha256 => Digester::Sha256(Sha256::new()),
            ChecksumType::Md5 => Digester::Md5(md5::Context::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Digester::Sha256(h) => h.update(data),
            Digester::Md5(c) => c.consume(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Digester::Sha256(h) => format!("{:x}", h.finalize()),
            Digester::Md5(c) => format!("{:x}", c.compute()),
        }
    }
}

/// File system based placer implementation.
pub struct FsPlacer {
    config: PlacerConfig,
}

impl FsPlacer {
    /// Creates a new file system placer with the given configuration.
    pub fn new(config: PlacerConfig) -> Self {
        Self { config }
    }

    /// Creates a placer with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PlacerConfig::default())
    }

    pub fn config(&self) -> &PlacerConfig {
        &self.config
    }

    fn temp_path(destination: &Path) -> PathBuf {
        let mut name = destination
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".snaggle-tmp");
        destination.with_file_name(name)
    }

    /// Copies a file, optionally hashing the bytes as they stream through.
    async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        checksum: Option<ChecksumType>,
    ) -> Result<(u64, Option<String>), PlacerError> {
        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlacerError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                PlacerError::Io(e)
            }
        })?;

        let dest_file = File::create(destination).await.map_err(|e| {
            PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.config.buffer_size, dest_file);
        let mut digester = checksum.map(Digester::new);

        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; self.config.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(|e| {
                PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            if bytes_read == 0 {
                break;
            }

            if let Some(ref mut d) = digester {
                d.update(&buffer[..bytes_read]);
            }

            writer.write_all(&buffer[..bytes_read]).await.map_err(|e| {
                PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
            })?;

            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(|e| {
            PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;
        writer.get_ref().sync_all().await.map_err(|e| {
            PlacerError::copy_failed(source.to_path_buf(), destination.to_path_buf(), e)
        })?;

        Ok((total_bytes, digester.map(Digester::finish)))
    }

    /// Calculates the checksum of a file using the specified algorithm.
    async fn calculate_checksum(
        &self,
        path: &Path,
        checksum_type: ChecksumType,
    ) -> Result<String, PlacerError> {
        let map_err = |e| PlacerError::ChecksumCalculationFailed {
            path: path.to_path_buf(),
            source: e,
        };
        let file = File::open(path).await.map_err(map_err)?;

        let mut reader = BufReader::with_capacity(self.config.buffer_size, file);
        let mut buffer = vec![0u8; self.config.buffer_size];
        let mut digester = Digester::new(checksum_type);
        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(map_err)?;
            if bytes_read == 0 {
                break;
            }
            digester.update(&buffer[..bytes_read]);
        }
        Ok(digester.finish())
    }

    /// Creates parent directories for a path.
    async fn ensure_parent_dirs(&self, path: &Path) -> Result<(), PlacerError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    PlacerError::DirectoryCreationFailed {
                        path: parent.to_path_buf(),
                        source: e,
                    }
                })?;
            }
        }
        Ok(())
    }

    async fn check_source(source: &Path) -> Result<u64, PlacerError> {
        match fs::metadata(source).await {
            Ok(meta) if meta.is_dir() => Err(PlacerError::SourceIsDirectory {
                path: source.to_path_buf(),
            }),
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PlacerError::SourceNotFound {
                    path: source.to_path_buf(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                Err(PlacerError::PermissionDenied {
                    path: source.to_path_buf(),
                })
            }
            Err(e) => Err(PlacerError::Io(e)),
        }
    }

    /// Copy through a temporary sibling, then rename into place.
    async fn copy_into_place(
        &self,
        placement: &FilePlacement,
    ) -> Result<(u64, Option<String>), PlacerError> {
        let tmp = Self::temp_path(&placement.destination);
        let copied = self
            .copy_file(&placement.source, &tmp, placement.verify)
            .await;
        let (size, source_sum) = match copied {
            Ok(v) => v,
            Err(e) => {
                let _ = fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        if let (Some(checksum_type), Some(expected)) = (placement.verify, source_sum.as_ref()) {
            let actual = self.calculate_checksum(&tmp, checksum_type).await?;
            if &actual != expected {
                let _ = fs::remove_file(&tmp).await;
                return Err(PlacerError::ChecksumMismatch {
                    path: placement.destination.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        if let Err(e) = fs::rename(&tmp, &placement.destination).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(PlacerError::copy_failed(
                placement.source.clone(),
                placement.destination.clone(),
                e,
            ));
        }
        Ok((size, source_sum))
    }
}

#[async_trait]
impl Placer for FsPlacer {
    fn name(&self) -> &str {
        "fs"
    }

    async fn place(&self, placement: FilePlacement) -> Result<PlacedFile, PlacerError> {
        let source_size = Self::check_source(&placement.source).await?;

        if placement.destination.exists() {
            if !placement.overwrite {
                return Err(PlacerError::DestinationExists {
                    path: placement.destination.clone(),
                });
            }
            debug!(path = %placement.destination.display(), "Replacing existing destination");
            fs::remove_file(&placement.destination).await?;
        }

        self.ensure_parent_dirs(&placement.destination).await?;

        if self.config.prefer_hardlinks {
            match fs::hard_link(&placement.source, &placement.destination).await {
                Ok(()) => {
                    return Ok(PlacedFile {
                        destination: placement.destination,
                        method: ImportMethod::Hardlink,
                        size_bytes: source_size,
                        checksum: None,
                    });
                }
                Err(e) => {
                    warn!(
                        source = %placement.source.display(),
                        destination = %placement.destination.display(),
                        error = %e,
                        "Hardlink failed, falling back to copy"
                    );
                }
            }
        }

        let (size_bytes, checksum) = self.copy_into_place(&placement).await?;
        Ok(PlacedFile {
            destination: placement.destination,
            method: ImportMethod::Copy,
            size_bytes,
            checksum,
        })
    }
}
