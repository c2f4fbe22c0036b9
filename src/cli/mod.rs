mod command;
mod runner;
mod util;

pub use command::{Command, WhereArg};
pub use runner::{OutputMode, run, run_to, run_with_format};
pub use util::{parse_order, parse_output_mode, parse_where};
