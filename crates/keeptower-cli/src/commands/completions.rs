use clap::CommandFactory;

use crate::cli::{Cli, CompletionsArgs};

/// Write a completion script for `args.shell` to stdout.
pub fn handle_completions(args: &CompletionsArgs) -> anyhow::Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(args.shell, &mut command, name, &mut std::io::stdout().lock());
    Ok(())
}
