//! Rewriting of the pack `Dockerfile`.

use std::fs;
use std::path::Path;

use error_stack::ResultExt;

use crate::config::ImageCatalog;
use crate::config::PythonVariant;
use crate::error::PackError;
use crate::error::PackResult;
use crate::pack::replace_atomically;

/// Directive the pack template uses to add its placeholder training script.
pub const ADD_TRAINING_SCRIPT: &str = "ADD training.py";
/// Base image directive of the TensorFlow training template.
pub const TF_BASE_IMAGE: &str = "FROM dls4e/tensorflow:1.9.0-py";

const PY2_TAG: &str = "1.9.0-py2";
const TEMP_PREFIX: &str = "Dockerfile_Temp";

#[derive(Debug, Clone, Copy)]
pub struct DockerfileUpdate<'a> {
    pub script_location: Option<&'a str>,
    pub script_folder_location: Option<&'a str>,
    pub local_registry_port: u16,
    /// Directory holding the experiment files, copied into the image.
    pub staging_dir: &'a str,
}

impl DockerfileUpdate<'_> {
    /// Whether a non-empty script or script folder was given.
    pub fn has_script(&self) -> bool {
        let given = |location: Option<&str>| location.is_some_and(|location| !location.is_empty());
        given(self.script_location) || given(self.script_folder_location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenDockerfile {
    pub content: String,
    /// Local registry repositories referenced by rewritten `FROM` lines.
    pub base_images: Vec<String>,
}

fn line_ending(line: &str) -> &str {
    if line.ends_with("\r\n") {
        "\r\n"
    } else if line.ends_with('\n') {
        "\n"
    } else {
        ""
    }
}

/// Rewrites Dockerfile `content`; lines other than the two template
/// directives pass through unchanged.
pub fn rewrite(
    content: &str,
    update: &DockerfileUpdate<'_>,
    catalog: &ImageCatalog,
) -> RewrittenDockerfile {
    let mut rewritten = String::with_capacity(content.len());
    let mut base_images = Vec::new();

    for line in content.split_inclusive('\n') {
        if line.starts_with(ADD_TRAINING_SCRIPT) {
            // dropped when there is nothing to copy
            if update.has_script() {
                rewritten.push_str(&format!("COPY {} .{}", update.staging_dir, line_ending(line)));
            }
        } else if line.starts_with(TF_BASE_IMAGE) {
            let variant = if line.contains(PY2_TAG) {
                PythonVariant::Python2
            } else {
                PythonVariant::Python3
            };
            let repository = format!(
                "127.0.0.1:{}/{}",
                update.local_registry_port,
                catalog.image_name(variant)
            );
            rewritten.push_str(&format!("FROM {repository}{}", line_ending(line)));
            base_images.push(repository);
        } else {
            rewritten.push_str(line);
        }
    }

    RewrittenDockerfile {
        content: rewritten,
        base_images,
    }
}

/// Rewrites the Dockerfile at `path` in place and returns the base image
/// repositories that should be pulled.
pub fn rewrite_dockerfile(
    path: &Path,
    update: &DockerfileUpdate<'_>,
    catalog: &ImageCatalog,
) -> PackResult<Vec<String>> {
    tracing::debug!("Modify dockerfile - start");
    let content = fs::read_to_string(path).change_context(PackError::Read {
        path: path.to_path_buf(),
    })?;

    let rewritten = rewrite(&content, update, catalog);
    replace_atomically(path, TEMP_PREFIX, "", &rewritten.content)?;

    tracing::debug!("Modify dockerfile - end");
    Ok(rewritten.base_images)
}
