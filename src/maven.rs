//! Maven coordinate parsing: `group:artifact:version[:classifier][@extension]`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A parsed Maven library specifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Gav {
    group: String,
    artifact: String,
    version: String,
    classifier: Option<String>,
    extension: Option<String>,
}

impl Gav {
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
        classifier: Option<String>,
        extension: Option<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier,
            extension,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    pub fn set_classifier(&mut self, classifier: Option<String>) {
        self.classifier = classifier;
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("jar")
    }

    /// The artifact's file name, e.g. `artifact-version-classifier.jar`.
    pub fn file_name(&self) -> String {
        let mut name = format!("{}-{}", self.artifact, self.version);
        if let Some(classifier) = &self.classifier {
            name.push('-');
            name.push_str(classifier);
        }
        name.push('.');
        name.push_str(self.extension());
        name
    }

    /// Path components making up this coordinate's directory under a Maven repository
    /// root: `group/with/slashes/artifact/version/`.
    pub fn dir_components(&self) -> impl Iterator<Item = &str> {
        self.group.split('.').chain([self.artifact.as_str(), self.version.as_str()])
    }

    /// The full file path for this coordinate under the given repository root.
    pub fn file(&self, repo_root: impl AsRef<Path>) -> PathBuf {
        let mut path = repo_root.as_ref().to_path_buf();
        for component in self.dir_components() {
            path.push(component);
        }
        path.push(self.file_name());
        path
    }

    /// The relative URL path for this coordinate under a Maven repository base URL,
    /// always using forward slashes regardless of the host platform.
    pub fn url_path(&self) -> String {
        let mut parts: Vec<&str> = self.group.split('.').collect();
        parts.push(&self.artifact);
        parts.push(&self.version);
        let dir = parts.join("/");
        format!("{dir}/{}", self.file_name())
    }
}

impl FromStr for Gav {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (body, extension) = match raw.split_once('@') {
            Some((body, ext)) => (body, Some(ext.to_string())),
            None => (raw, None),
        };

        let mut parts = body.split(':');
        let group = parts.next().filter(|s| !s.is_empty()).ok_or(())?;
        let artifact = parts.next().filter(|s| !s.is_empty()).ok_or(())?;
        let version = parts.next().filter(|s| !s.is_empty()).ok_or(())?;
        let classifier = parts.next().filter(|s| !s.is_empty()).map(str::to_string);

        if parts.next().is_some() {
            return Err(());
        }

        Ok(Self::new(group, artifact, version, classifier, extension))
    }
}

impl fmt::Display for Gav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if let Some(extension) = &self.extension {
            write!(f, "@{extension}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_artifact_version() {
        let gav: Gav = "com.mojang:brigadier:1.0.18".parse().unwrap();
        assert_eq!(gav.group(), "com.mojang");
        assert_eq!(gav.artifact(), "brigadier");
        assert_eq!(gav.version(), "1.0.18");
        assert_eq!(gav.classifier(), None);
        assert_eq!(gav.file_name(), "brigadier-1.0.18.jar");
    }

    #[test]
    fn parses_classifier_and_extension() {
        let gav: Gav = "org.lwjgl:lwjgl:3.3.1:natives-linux@jar".parse().unwrap();
        assert_eq!(gav.classifier(), Some("natives-linux"));
        assert_eq!(gav.file_name(), "lwjgl-3.3.1-natives-linux.jar");
    }

    #[test]
    fn dir_components_use_forward_slashes_in_url_path() {
        let gav: Gav = "com.mojang:brigadier:1.0.18".parse().unwrap();
        assert_eq!(gav.url_path(), "com/mojang/brigadier/1.0.18/brigadier-1.0.18.jar");
    }

    #[test]
    fn rejects_missing_components() {
        assert!("com.mojang:brigadier".parse::<Gav>().is_err());
    }
}
