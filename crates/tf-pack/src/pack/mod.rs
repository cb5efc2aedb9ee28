//! Files inside a pack run directory and how they are rewritten.

pub mod dockerfile;
pub mod draft;
pub mod literal;
pub mod script;
pub mod values;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use error_stack::ResultExt;

use crate::error::PackError;
use crate::error::PackResult;

/// Layout of a run directory created from a pack template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolder {
    root: PathBuf,
}

impl RunFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dockerfile(&self) -> PathBuf {
        self.root.join("Dockerfile")
    }

    pub fn values_yaml(&self, pack_type: &str) -> PathBuf {
        self.root.join("charts").join(pack_type).join("values.yaml")
    }

    pub fn draft_toml(&self) -> PathBuf {
        self.root.join("draft.toml")
    }
}

/// Replaces `target` with `contents` through a temp file in the same directory.
///
/// The temp file name starts with `temp_prefix`; it is renamed over `target`
/// only after the full contents are flushed, and removed on any failure. The
/// permissions of an existing `target` are carried over.
pub(crate) fn replace_atomically(
    target: &Path,
    temp_prefix: &str,
    temp_suffix: &str,
    contents: &str,
) -> PackResult<()> {
    let write_error = || PackError::Write {
        path: target.to_path_buf(),
    };
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::Builder::new()
        .prefix(temp_prefix)
        .suffix(temp_suffix)
        .tempfile_in(dir)
        .change_context_lazy(write_error)?;

    temp.write_all(contents.as_bytes())
        .change_context_lazy(write_error)?;
    temp.as_file()
        .sync_all()
        .change_context_lazy(write_error)?;

    if let Ok(metadata) = fs::metadata(target) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .change_context_lazy(write_error)?;
    }

    temp.persist(target)
        .change_context_lazy(write_error)
        .attach_printable_lazy(|| format!("temp file prefix: {temp_prefix}"))?;
    Ok(())
}
