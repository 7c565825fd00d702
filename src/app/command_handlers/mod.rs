use crate::app::cli::{help_text, parse_cli_verb, CliVerb};

pub mod build;
pub mod maintenance;
pub mod process;
pub mod runs;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Start => process::cmd_start(&args[1..]),
        CliVerb::Run => process::cmd_run(&args[1..]),
        CliVerb::Stop => process::cmd_stop(&args[1..]),
        CliVerb::Restart => process::cmd_restart(&args[1..]),
        CliVerb::Runs => runs::cmd_runs(&args[1..]),
        CliVerb::Show => runs::cmd_show(&args[1..]),
        CliVerb::Tail => runs::cmd_tail(&args[1..]),
        CliVerb::Reconcile => runs::cmd_reconcile(&args[1..]),
        CliVerb::Backup => maintenance::cmd_backup(&args[1..]),
        CliVerb::Envs => maintenance::cmd_envs(&args[1..]),
        CliVerb::Build => build::cmd_build(&args[1..]),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
