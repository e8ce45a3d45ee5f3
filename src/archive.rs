//! ZIP/JAR extraction.

use std::fs;
use std::io;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Extract every entry of `archive` into `dest_dir`, creating parent directories as
/// needed. Entries whose name cannot be turned into a safe relative path are skipped
/// rather than aborting the whole extraction, since some vendor archives ship malformed
/// or duplicated entries.
pub fn extract(archive: &Path, dest_dir: &Path) -> Result<Vec<String>, Error> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut extracted = Vec::with_capacity(zip.len());

    for i in 0..zip.len() {
        let mut entry = match zip.by_index(i) {
            Ok(entry) => entry,
            Err(_) => continue,
        };

        let Some(relative) = entry.enclosed_name() else {
            continue;
        };

        let out_path = dest_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out_file = fs::File::create(&out_path)?;
        io::copy(&mut entry, &mut out_file)?;
        extracted.push(relative.display().to_string());
    }

    Ok(extracted)
}

/// Read a single entry's bytes without extracting the whole archive (used to peek at
/// `install_profile.json` / `version.json` inside a Forge artifact).
pub fn read_entry(archive: &Path, entry_name: &str) -> Result<Option<Vec<u8>>, Error> {
    let file = fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    match zip.by_name(entry_name) {
        Ok(mut entry) => {
            let mut buf = Vec::new();
            io::copy(&mut entry, &mut buf)?;
            Ok(Some(buf))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_zip(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap();
        file
    }

    #[test]
    fn extract_writes_entries_under_dest_dir() {
        let archive = sample_zip(&[("version.json", b"{}"), ("lib/a.jar", b"jar-bytes")]);
        let dest = tempfile::tempdir().unwrap();
        let extracted = extract(archive.path(), dest.path()).unwrap();
        assert_eq!(extracted.len(), 2);
        assert_eq!(fs::read(dest.path().join("version.json")).unwrap(), b"{}");
        assert_eq!(fs::read(dest.path().join("lib/a.jar")).unwrap(), b"jar-bytes");
    }

    #[test]
    fn read_entry_returns_none_when_missing() {
        let archive = sample_zip(&[("version.json", b"{}")]);
        assert!(read_entry(archive.path(), "install_profile.json").unwrap().is_none());
        assert_eq!(read_entry(archive.path(), "version.json").unwrap(), Some(b"{}".to_vec()));
    }
}
