use crate::runtime::Runtime;
use anyhow::{Context, Result, bail};
use flate2::read::GzDecoder;
use log::{debug, info};
use std::path::Path;
use tar::{Archive, EntryType};

use super::{ArchiveExtractor, safe_relative_path};

/// Extractor for .tar.gz / .tgz archives (GitHub tarballs)
pub struct TarGzExtractor;

impl ArchiveExtractor for TarGzExtractor {
    fn can_handle(&self, archive_path: &Path) -> bool {
        let name = archive_path.to_string_lossy().to_lowercase();
        name.ends_with(".tar.gz") || name.ends_with(".tgz")
    }

    fn extract<R: Runtime>(
        &self,
        runtime: &R,
        archive_path: &Path,
        extract_to: &Path,
    ) -> Result<()> {
        debug!("Extracting tarball to {:?}...", extract_to);
        let reader = runtime
            .open(archive_path)
            .with_context(|| format!("Failed to open archive at {:?}", archive_path))?;

        let mut archive = Archive::new(GzDecoder::new(reader));
        let mut extracted = 0usize;

        for entry in archive
            .entries()
            .context("Failed to read tar entries")?
        {
            let mut entry = entry.context("Failed to read tar entry")?;
            let raw_path = entry.path().context("Invalid tar entry path")?.into_owned();

            let Some(relative) = safe_relative_path(&raw_path) else {
                debug!("Skipping entry with invalid path: {:?}", raw_path);
                continue;
            };
            let full_path = extract_to.join(&relative);

            let entry_type = entry.header().entry_type();
            match entry_type {
                EntryType::Directory => {
                    runtime.create_dir_all(&full_path)?;
                }
                EntryType::Regular | EntryType::Continuous => {
                    if let Some(parent) = full_path.parent() {
                        runtime.create_dir_all(parent)?;
                    }
                    let mut dest_file = runtime.create_file(&full_path)?;
                    std::io::copy(&mut entry, &mut dest_file)
                        .with_context(|| format!("Failed to extract file {:?}", full_path))?;

                    #[cfg(unix)]
                    if let Ok(mode) = entry.header().mode()
                        && let Err(e) = runtime.set_permissions(&full_path, mode)
                    {
                        debug!("Failed to set permissions on {:?}: {}", full_path, e);
                    }
                }
                // pax headers, links and devices carry no package content
                other => {
                    debug!("Skipping {:?} entry {:?}", other, raw_path);
                    continue;
                }
            }
            extracted += 1;
        }

        if extracted == 0 {
            bail!("Archive appears to be empty.");
        }

        info!("Extraction complete.");
        Ok(())
    }
}
