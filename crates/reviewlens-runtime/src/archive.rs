//! Archive extraction for downloaded service bundles.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::GzDecoder;

/// Extract a zip archive into `dest`, preserving Unix permissions.
///
/// Entries whose path would escape `dest` are skipped.
pub fn extract_zip(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).context("Failed to open downloaded archive")?;
    let mut archive = zip::ZipArchive::new(file).context("Failed to read zip archive")?;

    fs::create_dir_all(dest).context("Failed to create extraction directory")?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .context("Failed to read archive entry")?;
        let Some(relative) = entry.enclosed_name() else {
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)
            .with_context(|| format!("Failed to create file: {}", out_path.display()))?;
        io::copy(&mut entry, &mut out)
            .with_context(|| format!("Failed to extract: {}", out_path.display()))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&out_path, fs::Permissions::from_mode(mode))?;
        }
    }

    Ok(())
}

/// Extract a gzip-compressed tarball into `dest`.
pub fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).context("Failed to open downloaded archive")?;
    fs::create_dir_all(dest).context("Failed to create extraction directory")?;

    tar::Archive::new(GzDecoder::new(file))
        .unpack(dest)
        .with_context(|| format!("Failed to unpack {}", archive_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_extract_zip_nested() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.zip");
        {
            let mut writer = zip::ZipWriter::new(File::create(&archive_path).unwrap());
            writer
                .start_file("Ollama.app/Contents/Resources/ollama", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"binary").unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract_zip(&archive_path, &dest).unwrap();

        let extracted = dest.join("Ollama.app/Contents/Resources/ollama");
        assert_eq!(fs::read(extracted).unwrap(), b"binary");
    }

    #[test]
    fn test_extract_tar_gz() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.tgz");
        {
            let encoder = flate2::write::GzEncoder::new(
                File::create(&archive_path).unwrap(),
                flate2::Compression::default(),
            );
            let mut builder = tar::Builder::new(encoder);
            let data = b"#!/bin/sh\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder.append_data(&mut header, "bin/ollama", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        extract_tar_gz(&archive_path, &dest).unwrap();
        assert!(dest.join("bin/ollama").is_file());
    }

    #[test]
    fn test_missing_archive_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_zip(&dir.path().join("missing.zip"), dir.path()).is_err());
    }
}
