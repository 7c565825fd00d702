pub mod builder;
pub mod param;
pub mod quoting;

pub use builder::{build_command, Launcher, ParamValue};
pub use param::{ParamAction, ParamKind, ParamSpec};
pub use quoting::{quote_command, split_command};
