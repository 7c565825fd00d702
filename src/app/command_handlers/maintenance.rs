use crate::app::command_support::{ensure_runtime_root, load_settings, map_config_err, parse_count};
use crate::registry::backup_registry;
use crate::runtime::append_runtime_log;

pub fn cmd_backup(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let keep = match args {
        [] => settings.backups.keep,
        [flag, value] if flag == "--keep" => parse_count(value, "--keep")?,
        _ => return Err("usage: backup [--keep N]".to_string()),
    };
    let created = backup_registry(
        &settings.resolve_runs_db(&paths),
        &settings.resolve_backups_dir(&paths),
        keep,
    )
    .map_err(|e| e.to_string())?;
    append_runtime_log(
        &paths,
        "info",
        "registry.backup",
        &format!("path={} keep={keep}", created.display()),
    );
    Ok(format!(
        "backup created\npath={}\nkeep={keep}",
        created.display()
    ))
}

pub fn cmd_envs(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    match args {
        [] => {
            let names = settings.environment_names();
            if names.is_empty() {
                return Ok("no environments".to_string());
            }
            Ok(names.join("\n"))
        }
        [name] => {
            let env = settings.environment(name).map_err(map_config_err)?;
            Ok(env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        _ => Err("usage: envs [name]".to_string()),
    }
}
