use crate::app::command_support::{
    ensure_runtime_root, load_settings, parse_launch_args, resolve_argv,
};
use crate::command::quote_command;

pub fn cmd_build(args: &[String]) -> Result<String, String> {
    let paths = ensure_runtime_root()?;
    let settings = load_settings(&paths)?;
    let launch = parse_launch_args(args)?;
    if launch.module.is_none() {
        return Err("usage: build --module <name> [--params FILE] [--arg K=V]... [--flag NAME]..."
            .to_string());
    }
    let argv = resolve_argv(&launch, &settings)?;
    Ok(format!("command={}", quote_command(&argv)))
}
