//! Native library materialization: selecting, downloading and extracting OS-specific
//! native archives into a flat directory passed to the JVM as `-Djava.library.path`.

use std::path::{Path, PathBuf};

use crate::archive;
use crate::download::{self, Batch};
use crate::event::{Handler, ProgressKind};
use crate::os::Os;
use crate::rules::evaluate_library_rules;
use crate::version::Library;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("download error: {0}")]
    Download(#[from] download::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn select_classifier(library: &Library, os: Os) -> Option<String> {
    let downloads = library.downloads.as_ref()?;
    if downloads.classifiers.contains_key(os.natives_classifier()) {
        return Some(os.natives_classifier().to_string());
    }
    let fallback = os.natives_classifier_fallback()?;
    downloads.classifiers.contains_key(fallback).then(|| fallback.to_string())
}

/// Download and extract every OS-appropriate native archive for `libraries` into
/// `natives_dir`. Idempotent: if the directory already exists and is non-empty, the
/// whole phase is skipped.
pub async fn materialize(
    libraries: &[Library],
    natives_dir: &Path,
    os: Os,
    max_sockets: usize,
    handler: &mut impl Handler,
) -> Result<(), Error> {
    if directory_is_nonempty(natives_dir) {
        return Ok(());
    }

    std::fs::create_dir_all(natives_dir)?;

    let mut batch = Batch::new();
    let mut archives = Vec::new();

    for library in libraries {
        if !evaluate_library_rules(&library.rules, os).included() {
            continue;
        }
        let Some(classifier) = select_classifier(library, os) else {
            continue;
        };
        let Some(downloads) = &library.downloads else { continue };
        let Some(artifact) = downloads.classifiers.get(&classifier) else { continue };

        let file_name = artifact
            .path
            .as_deref()
            .and_then(|p| p.rsplit('/').next())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}-{classifier}.jar", library.name.replace([':', '@'], "-")));

        let dest = natives_dir.join(&file_name);
        let sha1 = crate::serde_util::parse_hex_bytes::<20>(&artifact.sha1);

        let mut entry = download::Entry::new(artifact.url.clone(), dest.clone()).with_size(artifact.size);
        if let Some(sha1) = sha1 {
            entry = entry.with_sha1(sha1);
        }
        batch.push(entry);
        archives.push(dest);
    }

    if !batch.is_empty() {
        for result in batch.download_async(max_sockets, ProgressKind::Natives, handler).await? {
            result?;
        }
    }

    for archive_path in archives {
        match archive::extract(&archive_path, natives_dir) {
            Ok(_) => {}
            Err(e) => handler.warning(Some(&archive_path), &format!("native extraction tolerated error: {e}")),
        }
        let _ = std::fs::remove_file(&archive_path);
    }

    Ok(())
}

fn directory_is_nonempty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map(|mut entries| entries.next().is_some()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_classifier_prefers_osx_over_macos_fallback() {
        let mut classifiers = std::collections::HashMap::new();
        classifiers.insert(
            "natives-osx".to_string(),
            crate::version::Artifact { path: None, url: "https://x".into(), sha1: "0".repeat(40), size: 1 },
        );
        classifiers.insert(
            "natives-macos".to_string(),
            crate::version::Artifact { path: None, url: "https://y".into(), sha1: "0".repeat(40), size: 1 },
        );
        let lib = Library {
            name: "org.lwjgl:lwjgl".into(),
            url: None,
            downloads: Some(crate::version::LibraryDownloads { artifact: None, classifiers }),
            rules: Vec::new(),
            natives: None,
        };
        assert_eq!(select_classifier(&lib, Os::Osx).as_deref(), Some("natives-osx"));
    }

    #[test]
    fn select_classifier_falls_back_to_macos() {
        let mut classifiers = std::collections::HashMap::new();
        classifiers.insert(
            "natives-macos".to_string(),
            crate::version::Artifact { path: None, url: "https://y".into(), sha1: "0".repeat(40), size: 1 },
        );
        let lib = Library {
            name: "org.lwjgl:lwjgl".into(),
            url: None,
            downloads: Some(crate::version::LibraryDownloads { artifact: None, classifiers }),
            rules: Vec::new(),
            natives: None,
        };
        assert_eq!(select_classifier(&lib, Os::Osx).as_deref(), Some("natives-macos"));
    }
}
