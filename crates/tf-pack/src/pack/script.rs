/// Builds the chart's `commandline.args` from the script and its parameters.
pub trait ScriptArgsFormatter {
    fn format(&self, script_location: Option<&str>, script_parameters: &[String]) -> Vec<String>;
}

/// Script location first, then every parameter token as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScriptArgs;

impl ScriptArgsFormatter for DefaultScriptArgs {
    fn format(&self, script_location: Option<&str>, script_parameters: &[String]) -> Vec<String> {
        script_location
            .map(str::to_string)
            .into_iter()
            .chain(script_parameters.iter().cloned())
            .collect()
    }
}
