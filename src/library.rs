//! Library materialization: resolving classpath JARs onto disk.

use std::path::{Path, PathBuf};

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
}

fn sha1_from_hex(hex: &str) -> Option<[u8; 20]> {
    crate::serde_util::parse_hex_bytes::<20>(hex)
}

/// Where a library lands on disk and how the downloader should fetch it, or `None` if
/// it has neither a `downloads.artifact` nor an alternate Maven `url` (optional
/// libraries of this shape are silently dropped, per the materializer contract).
fn resolve_path_and_url(library: &Library, library_root: &Path) -> Option<(PathBuf, String, Option<u64>, Option<[u8; 20]>)> {
    if let Some(downloads) = &library.downloads {
        if let Some(artifact) = &downloads.artifact {
            let rel = artifact.path.clone().unwrap_or_else(|| {
                library.name.parse::<crate::maven::Gav>().map(|g| g.url_path()).unwrap_or_else(|_| library.name.clone())
            });
            let dest = library_root.join(&rel);
            let sha1 = sha1_from_hex(&artifact.sha1);
            return Some((dest, artifact.url.clone(), Some(artifact.size), sha1));
        }
    }

    if let Some(base_url) = &library.url {
        let gav: crate::maven::Gav = library.name.parse().ok()?;
        let rel = gav.url_path();
        let dest = library_root.join(&rel);
        let url = format!("{}/{rel}", base_url.trim_end_matches('/'));
        return Some((dest, url, None, None));
    }

    None
}

/// Materialize every non-excluded library with a resolvable source, returning the
/// absolute classpath entries in input order, deduplicated by path.
pub async fn materialize(
    libraries: &[Library],
    library_root: &Path,
    os: Os,
    max_sockets: usize,
    handler: &mut impl Handler,
) -> Result<Vec<PathBuf>, Error> {
    let mut batch = Batch::new();
    let mut classpath = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for library in libraries {
        if !evaluate_library_rules(&library.rules, os).included() {
            continue;
        }

        let Some((dest, url, size, sha1)) = resolve_path_and_url(library, library_root) else {
            handler.warning(None, &format!("skipping library {} with no download source", library.name));
            continue;
        };

        if seen.insert(dest.clone()) {
            classpath.push(dest.clone());
        }

        let mut entry = download::Entry::new(url, dest);
        if let Some(size) = size {
            entry = entry.with_size(size);
        }
        if let Some(sha1) = sha1 {
            entry = entry.with_sha1(sha1);
        }
        batch.push(entry);
    }

    if !batch.is_empty() {
        for result in batch.download_async(max_sockets, ProgressKind::Libraries, handler).await? {
            result?;
        }
    }

    Ok(classpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::LibraryDownloads;

    fn simple_lib(name: &str) -> Library {
        Library { name: name.to_string(), url: None, downloads: None, rules: Vec::new(), natives: None }
    }

    #[tokio::test]
    async fn library_without_source_is_dropped() {
        let libs = vec![simple_lib("com.example:missing:1.0")];
        let root = std::env::temp_dir().join("mclaunch-test-libs-missing");
        let mut handler = ();
        let classpath = materialize(&libs, &root, Os::Linux, 2, &mut handler).await.unwrap();
        assert!(classpath.is_empty());
    }

    #[test]
    fn resolve_path_prefers_artifact_path() {
        let mut lib = simple_lib("com.mojang:brigadier:1.0.18");
        lib.downloads = Some(LibraryDownloads {
            artifact: Some(crate::version::Artifact {
                path: Some("com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar".into()),
                url: "https://libraries.minecraft.net/com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar".into(),
                sha1: "0000000000000000000000000000000000000a".into(),
                size: 10,
            }),
            classifiers: Default::default(),
        });
        let root = PathBuf::from("/tmp/mclaunch-libs");
        let (dest, _, size, sha1) = resolve_path_and_url(&lib, &root).unwrap();
        assert_eq!(dest, root.join("com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar"));
        assert_eq!(size, Some(10));
        assert!(sha1.is_some());
    }
}
