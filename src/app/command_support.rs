use crate::command::{build_command, ParamSpec, ParamValue};
use crate::config::{load_settings_or_default, ConfigError, Settings};
use crate::registry::RunRegistry;
use crate::runtime::{
    bootstrap_state_root, default_state_root_path, ProcessGroupSignals, ProcessSupervisor,
    StartRequest, StatePaths, SupervisorOptions,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub fn map_config_err(err: ConfigError) -> String {
    err.to_string()
}

pub fn ensure_runtime_root() -> Result<StatePaths, String> {
    let root = default_state_root_path().map_err(|e| e.to_string())?;
    let paths = StatePaths::new(root);
    bootstrap_state_root(&paths).map_err(|e| e.to_string())?;
    Ok(paths)
}

pub fn load_settings(paths: &StatePaths) -> Result<Settings, String> {
    load_settings_or_default(&paths.settings_file()).map_err(map_config_err)
}

pub fn open_registry(paths: &StatePaths, settings: &Settings) -> Result<RunRegistry, String> {
    RunRegistry::open(&settings.resolve_runs_db(paths)).map_err(|e| e.to_string())
}

pub fn build_supervisor(
    paths: &StatePaths,
    settings: &Settings,
) -> Result<ProcessSupervisor, String> {
    let registry = open_registry(paths, settings)?;
    Ok(ProcessSupervisor::new(
        paths.clone(),
        registry,
        Arc::new(ProcessGroupSignals),
        SupervisorOptions::from_settings(settings),
    ))
}

pub fn parse_pid(raw: &str) -> Result<u32, String> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|pid| *pid > 0)
        .ok_or_else(|| format!("invalid pid `{raw}`"))
}

pub fn parse_seconds(raw: &str) -> Result<Duration, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| format!("invalid duration `{raw}` (expected seconds)"))
}

pub fn parse_count(raw: &str, option: &str) -> Result<usize, String> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| format!("invalid value `{raw}` for {option}"))
}

fn split_key_value(raw: &str, option: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("{option} expects KEY=VALUE, got `{raw}`")),
    }
}

fn option_value<'a>(args: &'a [String], idx: usize, option: &str) -> Result<&'a str, String> {
    args.get(idx + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("{option} requires a value"))
}

/// What to launch: a literal argv or a runner module with parameter values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaunchArgs {
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub environment: Option<String>,
    pub prefix: Option<String>,
    pub argv: Vec<String>,
    pub module: Option<String>,
    pub params_file: Option<PathBuf>,
    pub values: BTreeMap<String, ParamValue>,
}

pub fn parse_launch_args(args: &[String]) -> Result<LaunchArgs, String> {
    let mut launch = LaunchArgs::default();
    let mut idx = 0;
    while idx < args.len() {
        let arg = args[idx].as_str();
        match arg {
            "--" => {
                launch.argv = args[idx + 1..].to_vec();
                break;
            }
            "--cwd" => {
                launch.cwd = Some(PathBuf::from(option_value(args, idx, arg)?));
                idx += 2;
            }
            "--env" => {
                let (key, value) = split_key_value(option_value(args, idx, arg)?, arg)?;
                launch.env.insert(key, value);
                idx += 2;
            }
            "--environment" => {
                launch.environment = Some(option_value(args, idx, arg)?.to_string());
                idx += 2;
            }
            "--prefix" => {
                launch.prefix = Some(option_value(args, idx, arg)?.to_string());
                idx += 2;
            }
            "--module" => {
                launch.module = Some(option_value(args, idx, arg)?.to_string());
                idx += 2;
            }
            "--params" => {
                launch.params_file = Some(PathBuf::from(option_value(args, idx, arg)?));
                idx += 2;
            }
            "--arg" => {
                let (key, value) = split_key_value(option_value(args, idx, arg)?, arg)?;
                launch.values.insert(key, ParamValue::Text(value));
                idx += 2;
            }
            "--flag" => {
                let name = option_value(args, idx, arg)?.to_string();
                launch.values.insert(name, ParamValue::Flag(true));
                idx += 2;
            }
            other => return Err(format!("unexpected argument `{other}`")),
        }
    }

    match (launch.module.is_some(), launch.argv.is_empty()) {
        (true, false) => Err("use either `--module` or `-- <cmd>...`, not both".to_string()),
        (false, true) => Err("missing command: pass `-- <cmd>...` or `--module <name>`".to_string()),
        _ => Ok(launch),
    }
}

/// Parameter descriptors from `--params`, plus an option or switch for every
/// value that no descriptor declares.
fn module_specs(launch: &LaunchArgs) -> Result<Vec<ParamSpec>, String> {
    let mut specs: Vec<ParamSpec> = match &launch.params_file {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
            serde_json::from_str(&raw)
                .map_err(|e| format!("failed to parse {}: {e}", path.display()))?
        }
        None => Vec::new(),
    };
    for (name, value) in &launch.values {
        if specs.iter().any(|spec| &spec.name == name) {
            continue;
        }
        let flag = format!("--{name}");
        specs.push(match value {
            ParamValue::Flag(_) => ParamSpec::switch(name.clone(), &[flag.as_str()]),
            ParamValue::Text(_) => ParamSpec::option(name.clone(), &[flag.as_str()]),
        });
    }
    Ok(specs)
}

pub fn resolve_argv(launch: &LaunchArgs, settings: &Settings) -> Result<Vec<String>, String> {
    match &launch.module {
        Some(module) => {
            let specs = module_specs(launch)?;
            Ok(build_command(
                module,
                &specs,
                &launch.values,
                &settings.launcher(),
            ))
        }
        None => Ok(launch.argv.clone()),
    }
}

/// Named environment first, explicit `--env` entries override it.
pub fn resolve_start_request(
    launch: &LaunchArgs,
    settings: &Settings,
) -> Result<StartRequest, String> {
    let mut env = match &launch.environment {
        Some(name) => settings.environment(name).map_err(map_config_err)?,
        None => BTreeMap::new(),
    };
    env.extend(launch.env.clone());
    Ok(StartRequest {
        argv: resolve_argv(launch, settings)?,
        cwd: launch.cwd.clone(),
        env,
        log_prefix: launch.prefix.clone(),
    })
}
