//! Textgate CLI: the `textgate` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{AuditCommands, Cli, Commands, PolicyCommands};

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            input,
            output,
            policy,
            audit,
            context,
            json,
        } => commands::evaluate::run(commands::evaluate::Args {
            input,
            output,
            policy,
            audit,
            context,
            json,
        }),

        Commands::Policy { command } => match command {
            PolicyCommands::Check { path, json } => commands::policy::run_check(path, json),
        },

        Commands::Audit { command } => match command {
            AuditCommands::Verify {
                records,
                anchor,
                expected,
                json,
            } => commands::audit::run_verify(records, anchor, expected, json),
            AuditCommands::Export {
                records,
                from,
                to,
                action,
                out,
                json,
            } => commands::audit::run_export(commands::audit::ExportArgs {
                records,
                from,
                to,
                action,
                out,
                json,
            }),
        },
    }
}
