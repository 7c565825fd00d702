//! Display form of a command and the inverse split used to recover argv from
//! rows that predate the stored argv column.

pub fn quote_command(argv: &[String]) -> String {
    shell_words::join(argv)
}

pub fn split_command(line: &str) -> Result<Vec<String>, String> {
    shell_words::split(line).map_err(|err| format!("cannot split `{line}`: {err}"))
}
