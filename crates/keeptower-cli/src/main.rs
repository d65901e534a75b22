//! KeepTower CLI - a multi-user encrypted credential vault
//!
//! Thin command-line surface over `keeptower-core`: every vault command
//! opens the vault, performs one operation and closes it again.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod helpers;
mod ui;

use clap::Parser;
use keeptower_core::VERSION;
use tracing_subscriber::EnvFilter;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{backup, completions, info, init, passwd, policy, records, upgrade, users};
use crate::errors::classify;
use crate::ui::print_error;

/// Install the stderr log subscriber; `RUST_LOG` overrides the level.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let ctx = AppContext::new(&cli);

    if let Err(err) = run(&ctx, &cli) {
        let (message, hint, code) = classify(&err);
        print_error(&ctx.ui(), &message, hint.as_deref());
        std::process::exit(code);
    }
}

fn run(ctx: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Init(args)) => init::handle_init(ctx, args),
        Some(Commands::Info) => info::handle_info(ctx),
        Some(Commands::Check) => info::handle_check(ctx),
        Some(Commands::Users(args)) => users::handle_users(ctx, &args.command),
        Some(Commands::Passwd) => passwd::handle_passwd(ctx),
        Some(Commands::Records(args)) => records::handle_records(ctx, &args.command),
        Some(Commands::Policy(args)) => policy::handle_policy(ctx, &args.command),
        Some(Commands::Backup(args)) => backup::handle_backup(ctx, &args.command),
        Some(Commands::Upgrade(args)) => upgrade::handle_upgrade(ctx, args),
        Some(Commands::Completions(args)) => completions::handle_completions(args),
        None => {
            println!("KeepTower v{}", VERSION);
            println!("\nQuickstart:");
            println!("  keeptower init --user alice");
            println!("  keeptower records add \"Mail\" --login alice@example.com");
            println!("  keeptower records list");
            println!("  keeptower users add bob");
            println!("\nRun `keeptower --help` for full usage.");
            Ok(())
        }
    }
}
