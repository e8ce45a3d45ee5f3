//! Bounded-concurrency batch HTTP downloader.
//!
//! Grounded in the teacher's `download.rs`: entries are collected into a [`Batch`],
//! scheduled onto a `tokio::task::JoinSet` capped at a configurable concurrency, and
//! progress is reported back to the caller through an `mpsc` channel. Unlike the
//! teacher, entries are never HTTP-cached by ETag — the content-addressed asset store
//! (keyed by SHA-1) already gives this crate a cache, so a second, file-level cache
//! would be redundant (see DESIGN.md).

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha1::{Digest, Sha1};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::event::{Handler, ProgressKind};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error for {path}: {source}")]
    Io { path: PathBuf, #[source] source: io::Error },
    #[error("{url}: unexpected status {status}")]
    Status { url: String, status: u16 },
    #[error("{url}: size mismatch, expected {expected} got {actual}")]
    Size { url: String, expected: u64, actual: u64 },
    #[error("{url}: sha1 mismatch")]
    Sha1Mismatch { url: String },
}

impl Error {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }
}

/// One pending download: a URL, a destination file, and optional verification data.
#[derive(Debug, Clone)]
pub struct Entry {
    pub url: String,
    pub dest: PathBuf,
    pub expected_size: Option<u64>,
    pub expected_sha1: Option<[u8; 20]>,
}

impl Entry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self { url: url.into(), dest: dest.into(), expected_size: None, expected_sha1: None }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    pub fn with_sha1(mut self, sha1: [u8; 20]) -> Self {
        self.expected_sha1 = Some(sha1);
        self
    }
}

/// The outcome of one entry: either it was fetched, or it was already present on disk
/// and matched its expected hash/size (a no-op from the network's point of view).
#[derive(Debug)]
pub struct EntryResult {
    pub dest: PathBuf,
    pub size: u64,
    pub sha1: [u8; 20],
}

/// A set of entries to be downloaded together, honoring a global concurrency cap.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<Entry>,
}

impl Batch {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Download every entry in this batch, reporting per-file and per-batch progress
    /// through `handler`. Entries whose destination already exists and matches its
    /// expected size/sha1 are skipped without any network access, which is what makes
    /// repeated launches idempotent.
    ///
    /// This is the async core, used by materializers that already run inside the
    /// pipeline's single runtime. Prefer [`Batch::download`] from synchronous code.
    pub async fn download_async(
        self,
        max_sockets: usize,
        kind: ProgressKind,
        handler: &mut impl Handler,
    ) -> Result<Vec<Result<EntryResult, Error>>, reqwest::Error> {
        let client = crate::http::client()?;
        Ok(download_many(client, max_sockets.max(1), kind, self.entries, handler).await)
    }

    /// Synchronous wrapper around [`Batch::download_async`], spinning up a fresh
    /// single-threaded runtime. Panics if called from within an already-running
    /// runtime; internal pipeline code should call `download_async` instead.
    pub fn download(
        self,
        max_sockets: usize,
        kind: ProgressKind,
        handler: &mut impl Handler,
    ) -> Result<Vec<Result<EntryResult, Error>>, reqwest::Error> {
        crate::rt::block_on(self.download_async(max_sockets, kind, handler))
    }
}

async fn download_many(
    client: reqwest::Client,
    max_sockets: usize,
    kind: ProgressKind,
    entries: Vec<Entry>,
    handler: &mut impl Handler,
) -> Vec<Result<EntryResult, Error>> {
    let total = entries.len();
    let entries = Arc::new(entries);
    let mut pending: Vec<usize> = (0..total).collect();
    let mut results: Vec<Option<Result<EntryResult, Error>>> = (0..total).map(|_| None).collect();

    handler.progress(kind, 0, total as u32);

    // Carries (entry index, bytes received so far, expected total) as chunks arrive, so
    // the handler can be driven from this single-threaded loop rather than from inside
    // the concurrently spawned download tasks (a `&mut impl Handler` cannot be shared
    // across them).
    let (tx, mut rx) = mpsc::channel::<(usize, u64, u64)>(max_sockets.max(1) * 2);
    let mut tasks = JoinSet::new();
    let mut completed = 0usize;

    while completed < total || !tasks.is_empty() {
        while tasks.len() < max_sockets && !pending.is_empty() {
            let index = pending.pop().unwrap();
            let entries = Arc::clone(&entries);
            let client = client.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let entry = &entries[index];
                let result = download_one(&client, entry, index, &tx, true).await;
                (index, result)
            });
        }

        tokio::select! {
            Some(joined) = tasks.join_next() => {
                let (index, result) = joined.expect("download task panicked");
                let name = entries[index].dest.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                handler.download(&name);
                results[index] = Some(result);
                completed += 1;
                handler.progress(kind, completed as u32, total as u32);
            }
            Some((index, current, chunk_total)) = rx.recv() => {
                let name = entries[index].dest.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                handler.download_status(&name, kind, current, chunk_total);
            }
            else => break,
        }
    }

    results.into_iter().map(|r| r.expect("every entry produces a result")).collect()
}

/// Fetch a single entry with the crate's one-retry-then-give-up policy (see the fetcher
/// contract: transport failures delete the partial file and retry once with retries
/// disabled on the second attempt).
async fn download_one(
    client: &reqwest::Client,
    entry: &Entry,
    index: usize,
    progress_tx: &mpsc::Sender<(usize, u64, u64)>,
    retry: bool,
) -> Result<EntryResult, Error> {
    if let Some(existing) = check_existing(entry).await {
        return Ok(existing);
    }

    match download_one_attempt(client, entry, index, progress_tx).await {
        Ok(result) => Ok(result),
        Err(e) if retry => {
            let _ = fs::remove_file(&entry.dest).await;
            Box::pin(download_one(client, entry, index, progress_tx, false)).await.map_err(|_| e)
        }
        Err(e) => Err(e),
    }
}

async fn check_existing(entry: &Entry) -> Option<EntryResult> {
    let metadata = fs::metadata(&entry.dest).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    if let Some(expected_size) = entry.expected_size {
        if metadata.len() != expected_size {
            return None;
        }
    }

    let bytes = fs::read(&entry.dest).await.ok()?;
    let digest: [u8; 20] = Sha1::digest(&bytes).into();

    if let Some(expected_sha1) = entry.expected_sha1 {
        if digest != expected_sha1 {
            return None;
        }
    }

    Some(EntryResult { dest: entry.dest.clone(), size: bytes.len() as u64, sha1: digest })
}

async fn download_one_attempt(
    client: &reqwest::Client,
    entry: &Entry,
    index: usize,
    progress_tx: &mpsc::Sender<(usize, u64, u64)>,
) -> Result<EntryResult, Error> {
    let response = client.get(&entry.url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Err(Error::Status { url: entry.url.clone(), status: 404 });
    }
    if !response.status().is_success() {
        return Err(Error::Status { url: entry.url.clone(), status: response.status().as_u16() });
    }

    // Content-Length wins over the caller's expected size, since it reflects what this
    // particular response actually reports.
    let total = response.content_length().or(entry.expected_size).unwrap_or(0);

    if let Some(parent) = entry.dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
    }

    let mut file = File::create(&entry.dest).await.map_err(|e| Error::io(&entry.dest, e))?;
    let mut size = 0u64;
    let mut hasher = Sha1::new();
    let mut stream = response;

    while let Some(chunk) = stream.chunk().await? {
        size += chunk.len() as u64;
        file.write_all(&chunk).await.map_err(|e| Error::io(&entry.dest, e))?;
        hasher.write_all(&chunk).map_err(|e| Error::io(&entry.dest, e))?;
        let _ = progress_tx.send((index, size, total)).await;
    }
    file.flush().await.map_err(|e| Error::io(&entry.dest, e))?;

    if let Some(expected_size) = entry.expected_size {
        if expected_size != size {
            return Err(Error::Size { url: entry.url.clone(), expected: expected_size, actual: size });
        }
    }

    let sha1: [u8; 20] = hasher.finalize().into();
    if let Some(expected_sha1) = entry.expected_sha1 {
        if expected_sha1 != sha1 {
            return Err(Error::Sha1Mismatch { url: entry.url.clone() });
        }
    }

    Ok(EntryResult { dest: entry.dest.clone(), size, sha1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn check_existing_skips_matching_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        tokio::fs::write(&dest, b"hello").await.unwrap();
        let digest: [u8; 20] = Sha1::digest(b"hello").into();

        let entry = Entry::new("https://example.invalid/file.bin", &dest).with_size(5).with_sha1(digest);
        let result = check_existing(&entry).await.expect("existing file should match");
        assert_eq!(result.size, 5);
        assert_eq!(result.sha1, digest);
    }

    #[tokio::test]
    async fn check_existing_misses_on_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.bin");
        tokio::fs::write(&dest, b"hello").await.unwrap();

        let entry = Entry::new("https://example.invalid/file.bin", &dest).with_size(999);
        assert!(check_existing(&entry).await.is_none());
    }

    #[tokio::test]
    async fn fetch_optional_returns_none_on_404() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/missing.json").with_status(404).create_async().await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.json");

        let result = fetch_optional(&format!("{}/missing.json", server.url()), &dest).await.unwrap();
        assert!(result.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn batch_download_async_fetches_and_verifies() {
        let mut server = mockito::Server::new_async().await;
        let body = b"library-bytes";
        let sha1: [u8; 20] = Sha1::digest(body).into();
        let mock = server.mock("GET", "/a.jar").with_status(200).with_body(body).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a.jar");
        let mut batch = Batch::new();
        batch.push(
            Entry::new(format!("{}/a.jar", server.url()), &dest).with_size(body.len() as u64).with_sha1(sha1),
        );

        let results = batch.download_async(2, ProgressKind::Libraries, &mut ()).await.unwrap();
        assert_eq!(results.len(), 1);
        let entry_result = results.into_iter().next().unwrap().unwrap();
        assert_eq!(entry_result.size, body.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
        mock.assert_async().await;
    }
}

/// Fetch a single file outside of a batch (used for the version manifest, asset index,
/// and other one-off JSON documents). Returns `Ok(None)` on a 404 rather than erroring,
/// matching the fetcher's "skipped-not-found" contract.
pub async fn fetch_optional(url: &str, dest: &Path) -> Result<Option<Vec<u8>>, Error> {
    let client = crate::http::client()?;
    let response = client.get(url).send().await?;
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !response.status().is_success() {
        return Err(Error::Status { url: url.to_string(), status: response.status().as_u16() });
    }
    let bytes = response.bytes().await?.to_vec();
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).await.map_err(|e| Error::io(parent, e))?;
    }
    fs::write(dest, &bytes).await.map_err(|e| Error::io(dest, e))?;
    Ok(Some(bytes))
}
