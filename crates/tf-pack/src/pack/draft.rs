//! Rewriting of the Draft deployment descriptor (`draft.toml`).

use std::fs;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use toml::Table;
use toml::Value;

use crate::error::PackError;
use crate::error::PackResult;
use crate::pack::replace_atomically;

const TEMP_PREFIX: &str = "draft_temp";
const TEMP_SUFFIX: &str = ".toml";

fn table_mut<'a>(table: &'a mut Table, key: &str, path: &str) -> PackResult<&'a mut Table> {
    match table
        .entry(key)
        .or_insert_with(|| Value::Table(Table::new()))
    {
        Value::Table(inner) => Ok(inner),
        other => Err(Report::new(PackError::UnexpectedShape {
            path: path.to_string(),
        })
        .attach_printable(format!("found {}", other.type_str()))),
    }
}

/// Points the development environment at `namespace` and `registry`.
pub fn apply(doc: &mut Table, namespace: &str, registry: &str) -> PackResult<()> {
    let environments = table_mut(doc, "environments", "environments")?;
    let development = table_mut(environments, "development", "environments.development")?;
    development.insert("namespace".to_string(), Value::String(namespace.to_string()));
    development.insert("registry".to_string(), Value::String(registry.to_string()));
    Ok(())
}

/// Rewrites `draft.toml` at `path` in place.
pub fn rewrite_draft_file(path: &Path, namespace: &str, registry: &str) -> PackResult<()> {
    tracing::debug!("Modify draft.toml - start");
    let content = fs::read_to_string(path).change_context(PackError::Read {
        path: path.to_path_buf(),
    })?;
    let mut doc = content.parse::<Table>().change_context(PackError::Parse {
        path: path.to_path_buf(),
    })?;
    tracing::debug!(environments = ?doc.get("environments"), "current draft environments");

    apply(&mut doc, namespace, registry)?;

    let content = toml::to_string(&doc).change_context(PackError::Serialize {
        path: path.to_path_buf(),
    })?;
    replace_atomically(path, TEMP_PREFIX, TEMP_SUFFIX, &content)?;
    tracing::debug!("Modify draft.toml - end");
    Ok(())
}
