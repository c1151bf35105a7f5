//! Command dispatch: bridges CLI args -> core services -> output formatting.

pub mod buttons;
pub mod check;
pub mod config_cmd;
pub mod discover;
pub mod send;
pub mod util;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Discover(args) => discover::handle(args, global).await,
        Command::Watch => watch::handle(global).await,
        Command::Check(args) => check::handle(args, global).await,
        Command::SendKey(args) => send::handle_key(args, global).await,
        Command::SendCode(args) => send::handle_code(args, global).await,
        Command::Buttons(args) => buttons::handle(&args, global),
        Command::Config(args) => config_cmd::handle(args, global),
        // Completions are handled before dispatch
        Command::Completions(_) => unreachable!(),
    }
}
