//! Resolution of the namespace that packs are deployed to.

use std::path::PathBuf;

use kube::config::Kubeconfig;
use kube::config::KubeconfigError;
use thiserror::Error;

/// Namespace used by kubectl when the context does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Error, Debug)]
pub enum NamespaceError {
    #[error("failed to load kubeconfig: {0}")]
    Kubeconfig(#[from] KubeconfigError),
    #[error("kubeconfig has no current context")]
    NoCurrentContext,
    #[error("current context `{0}` is not defined in kubeconfig")]
    ContextNotFound(String),
}

pub trait NamespaceSource {
    fn current_namespace(&self) -> Result<String, NamespaceError>;
}

/// Reads the active namespace of the current kubeconfig context.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigNamespace {
    kubeconfig: Option<PathBuf>,
}

impl KubeconfigNamespace {
    /// `None` falls back to `KUBECONFIG` or `~/.kube/config`.
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }
}

impl NamespaceSource for KubeconfigNamespace {
    fn current_namespace(&self) -> Result<String, NamespaceError> {
        let kubeconfig = match &self.kubeconfig {
            Some(path) => Kubeconfig::read_from(path)?,
            None => Kubeconfig::read()?,
        };
        current_context_namespace(&kubeconfig)
    }
}

pub fn current_context_namespace(kubeconfig: &Kubeconfig) -> Result<String, NamespaceError> {
    let current = kubeconfig
        .current_context
        .as_deref()
        .ok_or(NamespaceError::NoCurrentContext)?;

    let named = kubeconfig
        .contexts
        .iter()
        .find(|named| named.name == current)
        .ok_or_else(|| NamespaceError::ContextNotFound(current.to_string()))?;

    let namespace = named
        .context
        .as_ref()
        .and_then(|context| context.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    tracing::debug!(context = %current, namespace = %namespace, "resolved current namespace");
    Ok(namespace)
}

/// A namespace given up front, bypassing kubeconfig.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticNamespace(pub String);

impl NamespaceSource for StaticNamespace {
    fn current_namespace(&self) -> Result<String, NamespaceError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: local
  cluster:
    server: https://127.0.0.1:6443
users:
- name: me
  user:
    token: abc
contexts:
- name: dev
  context:
    cluster: local
    user: me
    namespace: experiments
- name: bare
  context:
    cluster: local
    user: me
"#;

    fn kubeconfig_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn namespace_of_current_context() {
        let file = kubeconfig_file(KUBECONFIG);
        let source = KubeconfigNamespace::new(Some(file.path().to_path_buf()));
        assert_eq!(source.current_namespace().unwrap(), "experiments");
    }

    #[test]
    fn context_without_namespace_uses_default() {
        let file = kubeconfig_file(&KUBECONFIG.replace("current-context: dev", "current-context: bare"));
        let source = KubeconfigNamespace::new(Some(file.path().to_path_buf()));
        assert_eq!(source.current_namespace().unwrap(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn unknown_current_context_is_error() {
        let file = kubeconfig_file(&KUBECONFIG.replace("current-context: dev", "current-context: prod"));
        let source = KubeconfigNamespace::new(Some(file.path().to_path_buf()));
        assert!(matches!(
            source.current_namespace(),
            Err(NamespaceError::ContextNotFound(name)) if name == "prod"
        ));
    }

    #[test]
    fn missing_file_is_kubeconfig_error() {
        let source = KubeconfigNamespace::new(Some(PathBuf::from("/nonexistent/kubeconfig")));
        assert!(matches!(
            source.current_namespace(),
            Err(NamespaceError::Kubeconfig(_))
        ));
    }

    #[test]
    fn static_namespace() {
        assert_eq!(
            StaticNamespace("team".to_string()).current_namespace().unwrap(),
            "team"
        );
    }
}
