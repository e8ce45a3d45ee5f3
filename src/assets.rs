//! Asset materialization: content-addressed object store, with optional legacy mirror.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::download::{self, Batch};
use crate::event::{Handler, ProgressKind};
use crate::version::AssetIndexRef;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("download error: {0}")]
    Download(#[from] download::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed asset index: {0}")]
    Json(#[from] serde_path_to_error::Error<serde_json::Error>),
}

#[derive(Debug, Clone, Deserialize)]
struct AssetObject {
    hash: String,
    size: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct AssetIndex {
    objects: HashMap<String, AssetObject>,
}

fn object_path(assets_root: &Path, hash: &str) -> PathBuf {
    assets_root.join("objects").join(&hash[0..2]).join(hash)
}

/// Fetch the asset index (if not already cached) and materialize every referenced
/// object into the content-addressed store, optionally mirroring into the legacy tree
/// for pre-1.6 versions.
pub async fn materialize(
    assets_root: &Path,
    resource_base_url: &str,
    asset_index: &AssetIndexRef,
    is_legacy: bool,
    max_sockets: usize,
    handler: &mut impl Handler,
) -> Result<(), Error> {
    let index_path = assets_root.join("indexes").join(format!("{}.json", asset_index.id));

    let bytes = match tokio::fs::read(&index_path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            let client = crate::http::client()?;
            let bytes = client.get(&asset_index.url).send().await?.bytes().await?.to_vec();
            if let Some(parent) = index_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&index_path, &bytes).await?;
            bytes
        }
    };

    let mut de = serde_json::Deserializer::from_slice(&bytes);
    let index: AssetIndex = serde_path_to_error::deserialize(&mut de)?;

    let mut batch = Batch::new();
    for object in index.objects.values() {
        let sha1 = crate::serde_util::parse_hex_bytes::<20>(&object.hash);
        let dest = object_path(assets_root, &object.hash);
        let url = format!("{resource_base_url}/{}/{}", &object.hash[0..2], object.hash);
        let mut entry = download::Entry::new(url, dest).with_size(object.size);
        if let Some(sha1) = sha1 {
            entry = entry.with_sha1(sha1);
        }
        batch.push(entry);
    }

    if !batch.is_empty() {
        for result in batch.download_async(max_sockets, ProgressKind::Assets, handler).await? {
            result?;
        }
    }

    if is_legacy {
        let total = index.objects.len() as u32;
        for (task, (logical_path, object)) in index.objects.iter().enumerate() {
            let src = object_path(assets_root, &object.hash);
            let dest = assets_root.join("legacy").join(logical_path);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            if tokio::fs::metadata(&dest).await.is_err() {
                tokio::fs::copy(&src, &dest).await?;
            }
            handler.progress(ProgressKind::AssetsCopy, task as u32 + 1, total);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_uses_first_two_hash_chars_as_bucket() {
        let root = PathBuf::from("/tmp/assets");
        let path = object_path(&root, "abcdef0123456789");
        assert_eq!(path, root.join("objects").join("ab").join("abcdef0123456789"));
    }
}
