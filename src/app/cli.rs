#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliVerb {
    Start,
    Run,
    Runs,
    Show,
    Tail,
    Stop,
    Restart,
    Reconcile,
    Backup,
    Build,
    Envs,
    Help,
    Unknown,
}

pub fn parse_cli_verb(input: &str) -> CliVerb {
    match input {
        "start" => CliVerb::Start,
        "run" => CliVerb::Run,
        "runs" => CliVerb::Runs,
        "show" => CliVerb::Show,
        "tail" => CliVerb::Tail,
        "stop" => CliVerb::Stop,
        "restart" => CliVerb::Restart,
        "reconcile" => CliVerb::Reconcile,
        "backup" => CliVerb::Backup,
        "build" => CliVerb::Build,
        "envs" => CliVerb::Envs,
        "help" | "--help" | "-h" => CliVerb::Help,
        _ => CliVerb::Unknown,
    }
}

pub fn cli_help_lines() -> Vec<String> {
    vec![
        "Commands:".to_string(),
        "  start [launch options] -- <cmd>...    Start a command in the background".to_string(),
        "  start [launch options] --module <m>   Start a runner module".to_string(),
        "  run [launch options] ...              Start and wait, streaming into the log"
            .to_string(),
        "  runs [--active]                       List recorded runs, newest first".to_string(),
        "  show <pid>                            Print one run as JSON".to_string(),
        "  tail <pid> [--lines N]                Print merged stdout/stderr tail".to_string(),
        "  stop <pid> [--force-after SECS]       Terminate a running process group".to_string(),
        "  restart <pid> [--force-after SECS]    Stop a run and start its command again"
            .to_string(),
        "  reconcile                             Mark runs whose process is gone as finished"
            .to_string(),
        "  backup [--keep N]                     Snapshot the runs database".to_string(),
        "  build --module <m> [module options]   Print the command a module launch would run"
            .to_string(),
        "  envs [name]                           List named environments or show one".to_string(),
        String::new(),
        "Launch options:".to_string(),
        "  --cwd <dir>                           Working directory".to_string(),
        "  --env KEY=VALUE                       Extra environment variable (repeatable)"
            .to_string(),
        "  --environment <name>                  Named environment from config.yaml".to_string(),
        "  --prefix <prefix>                     Log file prefix".to_string(),
        String::new(),
        "Module options:".to_string(),
        "  --params <file.json>                  Parameter descriptors for the module"
            .to_string(),
        "  --arg NAME=VALUE                      Parameter value (repeatable)".to_string(),
        "  --flag NAME                           Enable a boolean switch (repeatable)".to_string(),
    ]
}

pub(crate) fn help_text() -> String {
    cli_help_lines().join("\n")
}
