//! Version descriptor data model and resolution.
//!
//! A [`VersionDescriptor`] is the authoritative recipe for one Minecraft version. It is
//! either loaded straight from a cached `versions/<id>/<id>.json`, or resolved through
//! the two-stage Mojang manifest lookup (`version_manifest.json` -> per-version JSON).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::rules::Rule;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error reading {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("malformed version json at {path}: {source}")]
    Json { path: PathBuf, #[source] source: serde_path_to_error::Error<serde_json::Error> },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("version {0:?} not found in version manifest")]
    NotInManifest(String),
}

fn parse_json<T: for<'de> Deserialize<'de>>(path: &Path, bytes: &[u8]) -> Result<T, Error> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(de).map_err(|source| Error::Json { path: path.to_path_buf(), source })
}

/// One library entry of a version descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub natives: Option<std::collections::HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub classifiers: std::collections::HashMap<String, Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub path: Option<String>,
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndexRef {
    pub id: String,
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Downloads {
    pub client: Artifact,
}

/// One token of a modern structured argument list: either a bare literal, or a
/// rule-gated value (string or list of strings).
#[derive(Debug, Clone)]
pub enum Arg {
    Literal(String),
    Conditional { values: Vec<String>, rules: Vec<Rule> },
}

impl<'de> Deserialize<'de> for Arg {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Literal(String),
            Structured { #[serde(default)] rules: Vec<Rule>, value: RawValue },
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawValue {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Literal(s) => Arg::Literal(s),
            Raw::Structured { rules, value } => Arg::Conditional {
                values: match value {
                    RawValue::One(s) => vec![s],
                    RawValue::Many(v) => v,
                },
                rules,
            },
        })
    }
}

/// The polymorphic game-argument schema: legacy versions carry a single space-joined
/// string, modern versions carry a rule-gated token list.
#[derive(Debug, Clone)]
pub enum GameArguments {
    Legacy(String),
    Modern(Vec<Arg>),
}

impl GameArguments {
    /// Flatten into a plain token list, evaluating each structured entry's own rules
    /// (rather than dropping them, see DESIGN.md).
    pub fn resolve(
        &self,
        os: crate::os::Os,
        features: &std::collections::HashMap<String, bool>,
    ) -> Vec<String> {
        match self {
            Self::Legacy(s) => s.split_whitespace().map(str::to_string).collect(),
            Self::Modern(args) => args
                .iter()
                .flat_map(|arg| match arg {
                    Arg::Literal(s) => vec![s.clone()],
                    Arg::Conditional { values, rules } => {
                        if crate::rules::evaluate_argument_rules(rules, os, features) {
                            values.clone()
                        } else {
                            Vec::new()
                        }
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JvmArguments(pub Vec<Arg>);

impl JvmArguments {
    pub fn resolve(&self, os: crate::os::Os, features: &std::collections::HashMap<String, bool>) -> Vec<String> {
        self.0
            .iter()
            .flat_map(|arg| match arg {
                Arg::Literal(s) => vec![s.clone()],
                Arg::Conditional { values, rules } => {
                    if crate::rules::evaluate_argument_rules(rules, os, features) {
                        values.clone()
                    } else {
                        Vec::new()
                    }
                }
            })
            .collect()
    }
}

/// Raw JSON arguments block, kept untagged so legacy and modern manifests deserialize
/// from the same document shape.
#[derive(Debug, Clone, Deserialize)]
struct RawArguments {
    #[serde(default)]
    game: Vec<Arg>,
    #[serde(default)]
    jvm: Vec<Arg>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDescriptor {
    id: String,
    #[serde(rename = "mainClass")]
    main_class: String,
    assets: Option<String>,
    #[serde(rename = "assetIndex")]
    asset_index: Option<AssetIndexRef>,
    downloads: Option<Downloads>,
    #[serde(default)]
    libraries: Vec<Library>,
    arguments: Option<RawArguments>,
    #[serde(rename = "minecraftArguments")]
    minecraft_arguments: Option<String>,
}

/// The resolved, authoritative recipe for one version.
#[derive(Debug, Clone)]
pub struct VersionDescriptor {
    pub id: String,
    pub main_class: String,
    pub assets: Option<String>,
    pub asset_index: Option<AssetIndexRef>,
    pub downloads: Option<Downloads>,
    pub libraries: Vec<Library>,
    pub game_arguments: GameArguments,
    pub jvm_arguments: JvmArguments,
}

impl VersionDescriptor {
    fn from_raw(raw: RawDescriptor) -> Self {
        let (game_arguments, jvm_arguments) = match (raw.arguments, raw.minecraft_arguments) {
            (Some(args), _) => (GameArguments::Modern(args.game), JvmArguments(args.jvm)),
            (None, Some(flat)) => (GameArguments::Legacy(flat), JvmArguments(Vec::new())),
            (None, None) => (GameArguments::Modern(Vec::new()), JvmArguments(Vec::new())),
        };
        Self {
            id: raw.id,
            main_class: raw.main_class,
            assets: raw.assets,
            asset_index: raw.asset_index,
            downloads: raw.downloads,
            libraries: raw.libraries,
            game_arguments,
            jvm_arguments,
        }
    }

    /// Is this a pre-1.6-style version whose assets live in the legacy/virtual tree?
    pub fn is_legacy_assets(&self) -> bool {
        matches!(self.assets.as_deref(), Some("legacy") | Some("pre-1.6") | None)
    }

    pub fn from_json_bytes(path: &Path, bytes: &[u8]) -> Result<Self, Error> {
        let raw: RawDescriptor = parse_json(path, bytes)?;
        Ok(Self::from_raw(raw))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestEntry {
    id: String,
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    versions: Vec<ManifestEntry>,
}

/// Load a version descriptor from `versions/<id>/<id>.json` if present, otherwise
/// resolve it through the manifest. `version_json_override` lets a caller point at an
/// arbitrary path instead (`overrides.versionJson`).
///
/// Returns the descriptor's raw JSON bytes alongside the parsed value. The caller is
/// responsible for persisting them (via [`persist`]) once whatever they depend on — the
/// client jar, for this crate's standard pipeline — has actually been materialized;
/// `resolve` itself never writes `versions/<id>/<id>.json`, only reads it.
pub async fn resolve(
    root: &Path,
    meta_base_url: &str,
    id: &str,
    version_json_override: Option<&Path>,
) -> Result<(VersionDescriptor, Vec<u8>), Error> {
    let local_path = version_json_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join("versions").join(id).join(format!("{id}.json")));

    if let Ok(bytes) = tokio::fs::read(&local_path).await {
        let descriptor = VersionDescriptor::from_json_bytes(&local_path, &bytes)?;
        return Ok((descriptor, bytes));
    }

    let client = crate::http::client()?;
    let manifest_url = format!("{meta_base_url}/mc/game/version_manifest.json");
    let manifest_bytes = client.get(&manifest_url).send().await?.bytes().await?;
    let manifest: Manifest = parse_json(Path::new("version_manifest.json"), &manifest_bytes)?;

    let entry = manifest
        .versions
        .into_iter()
        .find(|entry| entry.id == id)
        .ok_or_else(|| Error::NotInManifest(id.to_string()))?;

    let descriptor_bytes = client.get(&entry.url).send().await?.bytes().await?.to_vec();
    let descriptor = VersionDescriptor::from_json_bytes(&local_path, &descriptor_bytes)?;
    Ok((descriptor, descriptor_bytes))
}

/// Persist a resolved descriptor's raw bytes beside the client jar, idempotently.
pub async fn persist(root: &Path, id: &str, bytes: &[u8]) -> Result<(), Error> {
    let path = root.join("versions").join(id).join(format!("{id}.json"));
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| Error::Io { path: parent.to_path_buf(), source })?;
    }
    tokio::fs::write(&path, bytes).await.map_err(|source| Error::Io { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_descriptor_splits_flat_arguments() {
        let raw = RawDescriptor {
            id: "1.7.10".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            assets: Some("legacy".into()),
            asset_index: None,
            downloads: None,
            libraries: Vec::new(),
            arguments: None,
            minecraft_arguments: Some("--username ${auth_player_name} --version ${version_name}".into()),
        };
        let descriptor = VersionDescriptor::from_raw(raw);
        assert!(descriptor.is_legacy_assets());
        let tokens = descriptor.game_arguments.resolve(crate::os::Os::Linux, &Default::default());
        assert_eq!(tokens, vec!["--username", "${auth_player_name}", "--version", "${version_name}"]);
    }

    #[test]
    fn modern_descriptor_is_not_legacy_assets() {
        let raw = RawDescriptor {
            id: "1.19.2".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            assets: Some("12".into()),
            asset_index: None,
            downloads: None,
            libraries: Vec::new(),
            arguments: Some(RawArguments { game: vec![], jvm: vec![] }),
            minecraft_arguments: None,
        };
        let descriptor = VersionDescriptor::from_raw(raw);
        assert!(!descriptor.is_legacy_assets());
    }
}
