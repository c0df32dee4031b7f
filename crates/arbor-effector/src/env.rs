//! Environment serialization and command wrapping

use arbor_types::ConfigValue;
use std::collections::BTreeMap;

/// Serializes a composed environment to primitive string pairs for
/// transport to the remote command
///
/// Strings pass through verbatim; every other value is rendered as JSON, so
/// structured values survive the shell boundary unambiguously.
pub struct ShellEnvironmentSerializer;

impl ShellEnvironmentSerializer {
    pub fn serialize(env: &BTreeMap<String, ConfigValue>) -> BTreeMap<String, String> {
        env.iter()
            .map(|(key, value)| (key.clone(), Self::serialize_value(value)))
            .collect()
    }

    fn serialize_value(value: &ConfigValue) -> String {
        match value {
            ConfigValue::String(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }
}

/// Wrap a command to execute in the given directory, when one is configured
pub fn make_command_executing_in_dir(command: &str, execution_dir: Option<&str>) -> String {
    match execution_dir {
        Some(dir) => format!("mkdir -p {dir} && cd {dir} && {command}"),
        None => command.to_string(),
    }
}
