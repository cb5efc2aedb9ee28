//! Rewriting of the chart's `values.yaml`.

use std::fs;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use serde_yaml::Mapping;
use serde_yaml::Value;

use crate::error::PackError;
use crate::error::PackResult;
use crate::pack::literal::parse_pack_value;
use crate::pack::literal::set_path;
use crate::pack::replace_atomically;

pub const WORKERS_COUNT: &str = "workersCount";
pub const P_SERVERS_COUNT: &str = "pServersCount";
pub const POD_COUNT: &str = "podCount";

const TEMP_PREFIX: &str = "values_temp";
const TEMP_SUFFIX: &str = ".yaml";

/// Everything the values file receives from a single update.
#[derive(Debug, Clone, Default)]
pub struct ValuesUpdate<'a> {
    /// Already formatted `commandline.args`.
    pub script_args: Vec<String>,
    pub experiment_name: &'a str,
    pub run_name: &'a str,
    pub cluster_registry_port: u16,
    pub pack_params: &'a [(String, String)],
    pub env_variables: &'a [String],
}

/// Applies `update` to a parsed values document.
pub fn apply(doc: &mut Value, update: &ValuesUpdate<'_>) -> PackResult<()> {
    if doc.is_null() {
        *doc = Value::Mapping(Mapping::new());
    }
    if !doc.is_mapping() {
        return Err(Report::new(PackError::UnexpectedShape {
            path: "<root>".to_string(),
        }));
    }

    if doc.get("commandline").is_some() {
        let args = update
            .script_args
            .iter()
            .map(|arg| Value::String(arg.clone()))
            .collect();
        set_path(doc, "commandline.args", Value::Sequence(args))?;
    }
    set_path(
        doc,
        "experimentName",
        Value::String(update.experiment_name.to_string()),
    )?;
    set_path(
        doc,
        "registry_port",
        Value::String(update.cluster_registry_port.to_string()),
    )?;
    set_path(
        doc,
        "image.clusterRepository",
        Value::String(format!(
            "127.0.0.1:{}/{}",
            update.cluster_registry_port, update.run_name
        )),
    )?;

    for (key, raw) in update.pack_params {
        let value = parse_pack_value(raw)?;
        tracing::debug!(key = %key, value = ?value, "applying pack param");
        set_path(doc, key, value)?;
    }

    update_pod_count(doc)?;
    merge_env(doc, update.env_variables)?;
    Ok(())
}

/// Sets `podCount` to `workersCount + pServersCount` when both are present.
///
/// A count of zero is present; only a missing key or an explicit null leaves
/// `podCount` untouched.
fn update_pod_count(doc: &mut Value) -> PackResult<()> {
    let workers = doc.get(WORKERS_COUNT).filter(|v| !v.is_null());
    let p_servers = doc.get(P_SERVERS_COUNT).filter(|v| !v.is_null());

    let (Some(workers), Some(p_servers)) = (workers, p_servers) else {
        tracing::debug!("replica counts incomplete, leaving {POD_COUNT} untouched");
        return Ok(());
    };

    let pod_count = coerce_count(WORKERS_COUNT, workers)? + coerce_count(P_SERVERS_COUNT, p_servers)?;
    set_path(doc, POD_COUNT, Value::Number(pod_count.into()))
}

fn coerce_count(key: &str, value: &Value) -> PackResult<i64> {
    let count = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f.trunc() as i64)),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    count.ok_or_else(|| {
        Report::new(PackError::InvalidCount {
            key: key.to_string(),
            value: format!("{value:?}"),
        })
    })
}

fn parse_env_variable(variable: &str) -> PackResult<(&str, &str)> {
    variable.split_once('=').ok_or_else(|| {
        Report::new(PackError::InvalidEnvVariable {
            variable: variable.to_string(),
        })
    })
}

fn env_entry(name: &str, value: &str) -> Value {
    let mut entry = Mapping::new();
    entry.insert(Value::from("name"), Value::from(name));
    entry.insert(Value::from("value"), Value::from(value));
    Value::Mapping(entry)
}

/// Adds `KEY=VALUE` variables to the `env` list.
///
/// A variable whose name is already listed gets its value replaced in place,
/// so applying the same variables twice leaves a single entry.
fn merge_env(doc: &mut Value, env_variables: &[String]) -> PackResult<()> {
    if env_variables.is_empty() {
        return Ok(());
    }
    let variables = env_variables
        .iter()
        .map(|variable| parse_env_variable(variable))
        .collect::<PackResult<Vec<_>>>()?;

    let Value::Mapping(root) = doc else {
        return Err(Report::new(PackError::UnexpectedShape {
            path: "<root>".to_string(),
        }));
    };
    let env = root.entry(Value::from("env")).or_insert(Value::Null);
    if env.is_null() {
        *env = Value::Sequence(Vec::new());
    }
    let Value::Sequence(entries) = env else {
        return Err(Report::new(PackError::UnexpectedShape {
            path: "env".to_string(),
        }));
    };

    for (name, value) in variables {
        let existing = entries
            .iter_mut()
            .filter_map(Value::as_mapping_mut)
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name));
        match existing {
            Some(entry) => {
                entry.insert(Value::from("value"), Value::from(value));
            }
            None => entries.push(env_entry(name, value)),
        }
    }
    Ok(())
}

fn load(path: &Path) -> PackResult<Value> {
    let content = fs::read_to_string(path).change_context(PackError::Read {
        path: path.to_path_buf(),
    })?;
    serde_yaml::from_str(&content).change_context(PackError::Parse {
        path: path.to_path_buf(),
    })
}

/// Rewrites the values file at `path` in place.
///
/// Nothing is written unless every change applies cleanly.
pub fn rewrite_values_file(path: &Path, update: &ValuesUpdate<'_>) -> PackResult<()> {
    tracing::debug!("Modify values.yaml - start");
    let mut doc = load(path)?;

    apply(&mut doc, update).attach_printable_lazy(|| format!("values file: {}", path.display()))?;

    let content = serde_yaml::to_string(&doc).change_context(PackError::Serialize {
        path: path.to_path_buf(),
    })?;
    replace_atomically(path, TEMP_PREFIX, TEMP_SUFFIX, &content)?;
    tracing::debug!("Modify values.yaml - end");
    Ok(())
}

/// Reads `podCount` back from the values file.
///
/// Absent, null, zero and empty values all read as `None`.
pub fn read_pod_count(path: &Path) -> PackResult<Option<i64>> {
    let doc = load(path)?;
    let pod_count = match doc.get(POD_COUNT) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if text.is_empty() => None,
        Some(value) => Some(coerce_count(POD_COUNT, value)?),
    };
    Ok(pod_count.filter(|count| *count != 0))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn yaml(source: &str) -> Value {
        serde_yaml::from_str(source).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn update<'a>(
        pack_params: &'a [(String, String)],
        env_variables: &'a [String],
    ) -> ValuesUpdate<'a> {
        ValuesUpdate {
            script_args: vec!["train.py".to_string(), "--epochs=3".to_string()],
            experiment_name: "mnist",
            run_name: "mnist-run-1",
            cluster_registry_port: 30500,
            pack_params,
            env_variables,
        }
    }

    #[test]
    fn fixed_fields_are_set() {
        let mut doc = yaml("commandline: {args: []}\nimage: {name: tf}");
        apply(&mut doc, &update(&[], &[])).unwrap();
        assert_eq!(
            doc,
            yaml(
                r#"
commandline: {args: [train.py, "--epochs=3"]}
image: {name: tf, clusterRepository: "127.0.0.1:30500/mnist-run-1"}
experimentName: mnist
registry_port: "30500"
"#
            )
        );
    }

    #[test]
    fn commandline_is_not_created_when_missing() {
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&[], &[])).unwrap();
        assert!(doc.get("commandline").is_none());
    }

    #[test]
    fn literal_params_are_parsed_and_plain_params_kept() {
        let pack_params = params(&[("foo", "[1, 2, 3]"), ("bar", "42"), ("a.b", "{'c': 'd'}")]);
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert_eq!(doc["foo"], yaml("[1, 2, 3]"));
        assert_eq!(doc["bar"], Value::from("42"));
        assert_eq!(doc["a"], yaml("{b: {c: d}}"));
    }

    #[test]
    fn pod_count_from_document_and_param() {
        let pack_params = params(&[(P_SERVERS_COUNT, "3")]);
        let mut doc = yaml("workersCount: 2\nimage: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert_eq!(doc[POD_COUNT].as_i64(), Some(5));
    }

    #[test]
    fn pod_count_from_params_only() {
        let pack_params = params(&[(WORKERS_COUNT, "4"), (P_SERVERS_COUNT, "1")]);
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert_eq!(doc[POD_COUNT].as_i64(), Some(5));
    }

    #[test]
    fn params_override_document_counts() {
        let pack_params = params(&[(WORKERS_COUNT, "7")]);
        let mut doc = yaml("workersCount: 2\npServersCount: 1\npodCount: 3\nimage: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert_eq!(doc[POD_COUNT].as_i64(), Some(8));
    }

    #[test]
    fn pod_count_absent_without_both_counts() {
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&[], &[])).unwrap();
        assert!(doc.get(POD_COUNT).is_none());

        let pack_params = params(&[(WORKERS_COUNT, "4")]);
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert!(doc.get(POD_COUNT).is_none());
    }

    #[test]
    fn zero_count_is_present() {
        let pack_params = params(&[(P_SERVERS_COUNT, "0")]);
        let mut doc = yaml("workersCount: 3\nimage: {}");
        apply(&mut doc, &update(&pack_params, &[])).unwrap();
        assert_eq!(doc[POD_COUNT].as_i64(), Some(3));
    }

    #[test]
    fn non_numeric_count_is_rejected() {
        let pack_params = params(&[(WORKERS_COUNT, "many"), (P_SERVERS_COUNT, "1")]);
        let mut doc = yaml("image: {}");
        let report = apply(&mut doc, &update(&pack_params, &[])).unwrap_err();
        assert!(matches!(
            report.current_context(),
            PackError::InvalidCount { key, .. } if key == WORKERS_COUNT
        ));
    }

    #[test]
    fn env_variables_are_appended() {
        let env = vec!["FOO=bar".to_string()];
        let mut doc = yaml("image: {}\nenv: [{name: X, value: '1'}]");
        apply(&mut doc, &update(&[], &env)).unwrap();
        assert_eq!(
            doc["env"],
            yaml("[{name: X, value: '1'}, {name: FOO, value: bar}]")
        );
    }

    #[test]
    fn env_list_is_created_and_split_on_first_equals() {
        let env = vec!["URL=http://host/?a=b".to_string()];
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&[], &env)).unwrap();
        assert_eq!(doc["env"], yaml("[{name: URL, value: 'http://host/?a=b'}]"));
    }

    #[test]
    fn env_variable_with_known_name_is_replaced() {
        let env = vec!["X=2".to_string()];
        let mut doc = yaml("image: {}\nenv: [{name: X, value: '1'}]");
        apply(&mut doc, &update(&[], &env)).unwrap();
        assert_eq!(doc["env"], yaml("[{name: X, value: '2'}]"));
    }

    #[test]
    fn repeated_env_name_keeps_last_value() {
        let env = vec!["A=1".to_string(), "B=x".to_string(), "A=2".to_string()];
        let mut doc = yaml("image: {}");
        apply(&mut doc, &update(&[], &env)).unwrap();
        assert_eq!(doc["env"], yaml("[{name: A, value: '2'}, {name: B, value: x}]"));
    }

    #[test]
    fn env_variable_without_equals_is_rejected() {
        let env = vec!["JUSTKEY".to_string()];
        let mut doc = yaml("image: {}");
        let report = apply(&mut doc, &update(&[], &env)).unwrap_err();
        assert!(matches!(
            report.current_context(),
            PackError::InvalidEnvVariable { variable } if variable == "JUSTKEY"
        ));
    }

    #[test]
    fn malformed_literal_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values.yaml");
        let original = "image: {name: tf}\nworkersCount: 1\n";
        fs::write(&path, original).unwrap();

        let pack_params = params(&[("x", "[1, 2")]);
        let report = rewrite_values_file(&path, &update(&pack_params, &[])).unwrap_err();
        assert!(matches!(
            report.current_context(),
            PackError::ValueParse { value } if value == "[1, 2"
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn read_pod_count_variants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("values.yaml");

        for (content, expected) in [
            ("image: {}\n", None),
            ("podCount: 0\n", None),
            ("podCount: ''\n", None),
            ("podCount: null\n", None),
            ("podCount: 4\n", Some(4)),
            ("podCount: '6'\n", Some(6)),
        ] {
            fs::write(&path, content).unwrap();
            assert_eq!(read_pod_count(&path).unwrap(), expected, "{content}");
        }
    }

    #[test]
    fn read_pod_count_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let report = read_pod_count(&dir.path().join("values.yaml")).unwrap_err();
        assert!(matches!(report.current_context(), PackError::Read { .. }));
    }
}
