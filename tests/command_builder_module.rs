use runboard::command::{
    build_command, quote_command, split_command, Launcher, ParamSpec, ParamValue,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

fn values(entries: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

#[test]
fn positionals_precede_options_and_switches_emit_only_flags() {
    let specs = vec![
        ParamSpec::option("limit", &["-l", "--limit"]),
        ParamSpec::positional("source"),
        ParamSpec::switch("verbose", &["-v", "--verbose"]),
        ParamSpec::switch("quiet", &["--quiet"]),
        ParamSpec::option("note", &["--note"]),
    ];
    let launcher = Launcher::Conda {
        env: "qf".to_string(),
        package: "runners".to_string(),
    };
    let argv = build_command(
        "ingest",
        &specs,
        &values(&[
            ("limit", ParamValue::Text("10".to_string())),
            ("source", ParamValue::Text("s3://bucket".to_string())),
            ("verbose", ParamValue::Flag(true)),
            ("quiet", ParamValue::Flag(false)),
            ("note", ParamValue::Text(String::new())),
        ]),
        &launcher,
    );

    assert_eq!(
        argv,
        [
            "conda",
            "run",
            "-n",
            "qf",
            "python",
            "-m",
            "runners.ingest",
            "s3://bucket",
            "--limit",
            "10",
            "--verbose",
        ]
        .map(String::from)
        .to_vec()
    );
}

#[test]
fn python_launcher_uses_interpreter_and_round_trips_through_quoting() {
    let launcher = Launcher::Python {
        interpreter: PathBuf::from("/opt/venv/bin/python"),
        package: "runners".to_string(),
    };
    let specs = vec![ParamSpec::option("title", &["--title"])];
    let argv = build_command(
        "report",
        &specs,
        &values(&[("title", ParamValue::Text("Q1 'final' run".to_string()))]),
        &launcher,
    );
    assert_eq!(argv[0], "/opt/venv/bin/python");
    assert_eq!(argv[2], "runners.report");

    let line = quote_command(&argv);
    assert_eq!(split_command(&line).expect("split"), argv);
}
