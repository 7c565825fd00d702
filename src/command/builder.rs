use super::ParamSpec;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How a runner module is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// `conda run -n <env> python -m <package>.<module>`
    Conda { env: String, package: String },
    /// `<interpreter> -m <package>.<module>`
    Python {
        interpreter: PathBuf,
        package: String,
    },
}

impl Launcher {
    fn prefix(&self, module: &str) -> Vec<String> {
        match self {
            Launcher::Conda { env, package } => vec![
                "conda".to_string(),
                "run".to_string(),
                "-n".to_string(),
                env.clone(),
                "python".to_string(),
                "-m".to_string(),
                format!("{package}.{module}"),
            ],
            Launcher::Python {
                interpreter,
                package,
            } => vec![
                interpreter.display().to_string(),
                "-m".to_string(),
                format!("{package}.{module}"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Text(String),
    Flag(bool),
}

impl ParamValue {
    fn render(&self) -> String {
        match self {
            ParamValue::Text(value) => value.clone(),
            ParamValue::Flag(value) => value.to_string(),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Flag(value) => *value,
            ParamValue::Text(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
        }
    }

    fn is_blank(&self) -> bool {
        matches!(self, ParamValue::Text(value) if value.is_empty())
    }
}

/// Builds the argv for `module`: positionals first in declaration order, then
/// options. Missing and empty values are skipped.
pub fn build_command(
    module: &str,
    specs: &[ParamSpec],
    values: &BTreeMap<String, ParamValue>,
    launcher: &Launcher,
) -> Vec<String> {
    let mut argv = launcher.prefix(module);

    for spec in specs.iter().filter(|spec| spec.positional) {
        let Some(value) = values.get(&spec.name) else {
            continue;
        };
        if value.is_blank() {
            continue;
        }
        argv.push(value.render());
    }

    for spec in specs.iter().filter(|spec| !spec.positional) {
        let Some(flag) = spec.preferred_flag() else {
            continue;
        };
        let Some(value) = values.get(&spec.name) else {
            continue;
        };
        if spec.is_switch() {
            if value.is_truthy() {
                argv.push(flag.to_string());
            }
            continue;
        }
        if value.is_blank() {
            continue;
        }
        argv.push(flag.to_string());
        argv.push(value.render());
    }

    argv
}
