//! Forge overlay: two mutually exclusive modes depending on the shape of the supplied
//! installer/universal JAR.
//!
//! - **Legacy universal JAR** (no `install_profile.json` entry): its bundled
//!   `version.json` is read directly, its libraries are materialized, and its jar
//!   becomes a classpath prefix ahead of vanilla.
//! - **Modern installer JAR** (`install_profile.json` present): a bundled ForgeWrapper
//!   JAR is invoked as a subprocess to perform the actual installation, after which the
//!   `version.json` it produces is loaded as a [`crate::version::VersionDescriptor`]
//!   layered on top of vanilla (the same handling as a `version.custom` layer).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::archive;
use crate::event::Handler;
use crate::library;
use crate::os::Os;
use crate::version::VersionDescriptor;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("archive error: {0}")]
    Archive(#[from] archive::Error),
    #[error("forge archive has neither version.json nor install_profile.json")]
    MissingDescriptor,
    #[error("library error: {0}")]
    Library(#[from] library::Error),
    #[error("version json error: {0}")]
    Version(#[from] crate::version::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ForgeWrapper exited with status {0:?}")]
    WrapperFailed(Option<i32>),
}

/// Default Forge Maven mirror, tried after any caller-configured mirror.
pub const DEFAULT_FORGE_MAVEN_URL: &str = "http://files.minecraftforge.net/maven/";

/// Fallback mirrors tried after the default Forge Maven, for "simple" libraries that
/// carry no `downloads.artifact`.
pub const FALLBACK_MAVEN_URLS: &[&str] = &[
    "https://libraries.minecraft.net/",
    "https://search.maven.org/remotecontent?filepath=",
];

/// The `version.json` main-class-and-libraries overlay produced by a legacy Forge
/// universal JAR.
pub struct LegacyOverlay {
    pub main_class: String,
    pub classpath_prefix: Vec<PathBuf>,
}

fn has_entry(archive_path: &Path, name: &str) -> Result<bool, Error> {
    Ok(archive::read_entry(archive_path, name)?.is_some())
}

/// Materialize the legacy (pre-installer) Forge overlay: extract its bundled
/// `version.json`, resolve its libraries against the Forge Maven mirrors, and return
/// the resulting classpath prefix plus main class.
pub async fn materialize_legacy(
    archive_path: &Path,
    forge_dir: &Path,
    library_root: &Path,
    os: Os,
    max_sockets: usize,
    configured_mirror: Option<&str>,
    handler: &mut impl Handler,
) -> Result<LegacyOverlay, Error> {
    let version_json = archive::read_entry(archive_path, "version.json")?.ok_or(Error::MissingDescriptor)?;

    std::fs::create_dir_all(forge_dir)?;
    let version_json_path = forge_dir.join("version.json");
    std::fs::write(&version_json_path, &version_json)?;

    let descriptor = VersionDescriptor::from_json_bytes(&version_json_path, &version_json)?;

    // Libraries with neither a direct artifact nor an explicit Maven root are tried
    // against each Forge mirror in turn, keeping whichever one actually produces the
    // file; this mirrors the install-time fallback search a Forge launcher performs.
    let mut classpath_prefix = Vec::new();
    let mut without_source: Vec<_> =
        descriptor.libraries.iter().cloned().filter(|lib| lib.downloads.is_none() && lib.url.is_none()).collect();
    let mut with_source: Vec<_> =
        descriptor.libraries.iter().cloned().filter(|lib| lib.downloads.is_some() || lib.url.is_some()).collect();

    classpath_prefix.extend(library::materialize(&with_source, library_root, os, max_sockets, handler).await?);
    with_source.clear();

    // Configured mirror first, then the default Forge Maven, then the fallback search
    // endpoints — the caller's override always wins when one is present.
    let mirrors: Vec<&str> =
        configured_mirror.into_iter().chain(std::iter::once(DEFAULT_FORGE_MAVEN_URL)).chain(FALLBACK_MAVEN_URLS.iter().copied()).collect();

    for mirror in mirrors {
        if without_source.is_empty() {
            break;
        }
        for lib in &mut without_source {
            lib.url = Some(mirror.to_string());
        }
        match library::materialize(&without_source, library_root, os, max_sockets, handler).await {
            Ok(entries) => {
                classpath_prefix.extend(entries);
                without_source.clear();
            }
            Err(e) => handler.warning(None, &format!("forge mirror {mirror} failed: {e}")),
        }
    }

    classpath_prefix.push(archive_path.to_path_buf());

    Ok(LegacyOverlay { main_class: descriptor.main_class, classpath_prefix })
}

/// Invoke the bundled ForgeWrapper to run the modern installer JAR against `root`, then
/// load and return the `version.json` it produces as a custom overlay descriptor.
pub async fn materialize_modern(
    archive_path: &Path,
    root: &Path,
    forge_dir: &Path,
    library_root: &Path,
    java_path: &Path,
    wrapper_jar: &Path,
    wrapper_version: &str,
    handler: &mut impl Handler,
) -> Result<VersionDescriptor, Error> {
    std::fs::create_dir_all(forge_dir)?;

    let save_to = library_root.join("io/github/zekerzhayard/ForgeWrapper").join(wrapper_version);

    let mut child = tokio::process::Command::new(java_path)
        .arg("-jar")
        .arg(wrapper_jar)
        .arg(format!("--installer={}", archive_path.display()))
        .arg(format!("--instance={}", root.display()))
        .arg(format!("--saveTo={}", save_to.display()))
        .current_dir(root)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    relay_output(&mut child, handler).await;

    let status = child.wait().await?;
    if !status.success() {
        return Err(Error::WrapperFailed(status.code()));
    }

    let version_json_path = forge_dir.join("version.json");
    let bytes = tokio::fs::read(&version_json_path).await?;
    Ok(VersionDescriptor::from_json_bytes(&version_json_path, &bytes)?)
}

async fn relay_output(child: &mut tokio::process::Child, handler: &mut impl Handler) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            handler.data(&line);
        }
    }
    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            handler.data(&line);
        }
    }
}

/// Detect which overlay mode a Forge archive requires.
pub enum ForgeMode {
    Legacy,
    Modern,
}

pub fn detect_mode(archive_path: &Path) -> Result<ForgeMode, Error> {
    if has_entry(archive_path, "install_profile.json")? {
        Ok(ForgeMode::Modern)
    } else if has_entry(archive_path, "version.json")? {
        Ok(ForgeMode::Legacy)
    } else {
        Err(Error::MissingDescriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn sample_jar(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
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
    fn detects_modern_installer_by_profile() {
        let jar = sample_jar(&[("install_profile.json", b"{}"), ("version.json", b"{}")]);
        assert!(matches!(detect_mode(jar.path()).unwrap(), ForgeMode::Modern));
    }

    #[test]
    fn detects_legacy_universal_by_version_json_only() {
        let jar = sample_jar(&[("version.json", b"{}")]);
        assert!(matches!(detect_mode(jar.path()).unwrap(), ForgeMode::Legacy));
    }

    #[test]
    fn rejects_jar_with_neither_marker() {
        let jar = sample_jar(&[("META-INF/MANIFEST.MF", b"")]);
        assert!(matches!(detect_mode(jar.path()), Err(Error::MissingDescriptor)));
    }
}
