use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Python flavour of the TensorFlow training base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PythonVariant {
    Python2,
    Python3,
}

/// Concrete names of the training base images in the platform registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageCatalog {
    pub py2_image_name: String,
    pub py3_image_name: String,
}

impl Default for ImageCatalog {
    fn default() -> Self {
        Self {
            py2_image_name: "dls4e/tensorflow:1.9.0-py2".to_string(),
            py3_image_name: "dls4e/tensorflow:1.9.0-py3".to_string(),
        }
    }
}

impl ImageCatalog {
    pub fn image_name(&self, variant: PythonVariant) -> &str {
        match variant {
            PythonVariant::Python2 => &self.py2_image_name,
            PythonVariant::Python3 => &self.py3_image_name,
        }
    }
}

/// Settings shared by every configuration update, owned by the caller.
///
/// Loaded from an optional YAML file; missing keys fall back to defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackConfig {
    #[serde(flatten)]
    pub images: ImageCatalog,
    /// Directory with experiment files that replaces the template script.
    pub staging_dir: String,
    /// Container runtime client used to pull base images.
    pub docker_binary: PathBuf,
    /// Explicit kubeconfig; `None` uses `KUBECONFIG` or `~/.kube/config`.
    pub kubeconfig: Option<PathBuf>,
    /// Fixed namespace that bypasses the kubeconfig lookup.
    pub namespace: Option<String>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            images: ImageCatalog::default(),
            staging_dir: "folder".to_string(),
            docker_binary: PathBuf::from("docker"),
            kubeconfig: None,
            namespace: None,
        }
    }
}

impl PackConfig {
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Loads the configuration file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        tracing::info!("Loading pack configuration from {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read pack configuration {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("parse pack configuration {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = PackConfig::from_yaml("py3ImageName: registry/tf:py3\nstagingDir: exp\n").unwrap();
        assert_eq!(config.images.py3_image_name, "registry/tf:py3");
        assert_eq!(config.images.py2_image_name, "dls4e/tensorflow:1.9.0-py2");
        assert_eq!(config.staging_dir, "exp");
        assert_eq!(config.docker_binary, PathBuf::from("docker"));
    }

    #[test]
    fn load_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"namespace: team-a\ndockerBinary: /usr/bin/podman\n")
            .unwrap();

        let config = PackConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
        assert_eq!(config.docker_binary, PathBuf::from("/usr/bin/podman"));
    }

    #[test]
    fn load_without_path_is_default() {
        assert_eq!(PackConfig::load(None).unwrap(), PackConfig::default());
    }

    #[test]
    fn catalog_resolves_variants() {
        let catalog = ImageCatalog::default();
        assert_eq!(
            catalog.image_name(PythonVariant::Python2),
            "dls4e/tensorflow:1.9.0-py2"
        );
        assert_eq!(
            catalog.image_name(PythonVariant::Python3),
            "dls4e/tensorflow:1.9.0-py3"
        );
    }
}
