use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamAction {
    Store,
    StoreTrue,
}

/// Descriptor of one command-line parameter of a runner module, as produced
/// by parameter discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub positional: bool,
    #[serde(default)]
    pub kind: ParamKind,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub action: Option<ParamAction>,
}

impl ParamSpec {
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: Vec::new(),
            positional: true,
            kind: ParamKind::Str,
            default: None,
            choices: None,
            help: None,
            action: None,
        }
    }

    pub fn option(name: impl Into<String>, flags: &[&str]) -> Self {
        Self {
            name: name.into(),
            flags: flags.iter().map(|flag| flag.to_string()).collect(),
            positional: false,
            kind: ParamKind::Str,
            default: None,
            choices: None,
            help: None,
            action: Some(ParamAction::Store),
        }
    }

    pub fn switch(name: impl Into<String>, flags: &[&str]) -> Self {
        Self {
            kind: ParamKind::Bool,
            action: Some(ParamAction::StoreTrue),
            ..Self::option(name, flags)
        }
    }

    /// Longest `--` flag, else the first declared flag. Positionals have none.
    pub fn preferred_flag(&self) -> Option<&str> {
        if self.positional {
            return None;
        }
        let mut best: Option<&str> = None;
        for flag in self.flags.iter().filter(|flag| flag.starts_with("--")) {
            if best.map(|current| flag.len() > current.len()).unwrap_or(true) {
                best = Some(flag.as_str());
            }
        }
        best.or_else(|| self.flags.first().map(String::as_str))
    }

    pub fn is_switch(&self) -> bool {
        self.kind == ParamKind::Bool && self.action == Some(ParamAction::StoreTrue)
    }
}
