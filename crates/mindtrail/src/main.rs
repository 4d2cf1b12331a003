mod cli;
mod commands;
mod host;
mod observe;
mod session;

use clap::Parser;
use cli::{Cli, Commands};
use host::HostEnv;

fn main() -> anyhow::Result<()> {
    let env = HostEnv::from_env();

    // stdout carries hook and query output, so logs go to stderr
    let default_level = if env.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => commands::version::run(),
        Commands::HookSessionStart => commands::hooks::hook_session_start(&env),
        Commands::HookPostToolUse => commands::hooks::hook_post_tool_use(&env),
        Commands::HookStop => commands::hooks::hook_stop(&env),
        Commands::Search { query, k, mode } => {
            commands::query::search(&env, &query, k, mode.into())
        }
        Commands::Ask { question, k } => commands::query::ask(&env, &question, k),
        Commands::Stats => commands::query::stats(&env),
        Commands::Timeline {
            limit,
            oldest_first,
        } => commands::query::timeline(&env, limit, oldest_first),
    }
}
