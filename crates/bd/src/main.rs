//! `bd` -- dependency-aware issue tracker CLI.
//!
//! This is the entry point for the beads Rust port. It parses CLI arguments
//! with clap, resolves the runtime context, and dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use cli::{Cli, Commands};
use context::RuntimeContext;

/// Tracks whether a Ctrl+C has already been received.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    // Install signal handlers for graceful shutdown.
    // First Ctrl+C: exit cleanly. Second: force exit.
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            // Second signal: force exit
            std::process::exit(1);
        }
        // First signal: exit cleanly
        std::process::exit(0);
    });

    // Parse CLI arguments
    let cli = Cli::parse();

    // Build runtime context from global args
    let ctx = RuntimeContext::from_global_args(&cli.global);

    // Set up logging based on verbosity
    if ctx.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("bd=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    // Dispatch to command handler
    let result = match cli.command {
        // ===== Working With Issues =====
        Some(Commands::Create(args)) => commands::create::run(&ctx, &args),
        Some(Commands::Update(args)) => commands::update::run(&ctx, &args),
        Some(Commands::Close(args)) => commands::close::run(&ctx, &args),
        Some(Commands::Show(args)) => commands::show::run(&ctx, &args),
        Some(Commands::List(args)) => commands::list::run(&ctx, &args),
        // ===== Views & Reports =====
        Some(Commands::Ready(args)) => commands::ready::run(&ctx, &args),
        Some(Commands::Blocked(args)) => commands::blocked::run(&ctx, &args),
        Some(Commands::Search(args)) => commands::search::run(&ctx, &args),
        Some(Commands::Stats(args)) => commands::stats::run(&ctx, &args),
        Some(Commands::Graph(args)) => commands::graph::run(&ctx, &args),
        // ===== Dependencies & Labels =====
        Some(Commands::Label(args)) => commands::label::run(&ctx, &args),
        Some(Commands::Dep(args)) => commands::dep::run(&ctx, &args),
        // ===== Setup =====
        Some(Commands::Init(args)) => commands::init::run(&ctx, &args),
        // ===== Import / Export / Backup =====
        Some(Commands::Import(args)) => commands::import::run(&ctx, &args),
        Some(Commands::Export(args)) => commands::export::run(&ctx, &args),
        Some(Commands::Backup(args)) => commands::backup::run(&ctx, &args),
        // ===== Repository Aggregation =====
        Some(Commands::Repo(args)) => commands::repo_cmd::run(&ctx, &args),
        // ===== Version Control =====
        Some(Commands::Dolt(args)) => commands::dolt::run(&ctx, &args),
        Some(Commands::Gc(args)) => commands::gc::run(&ctx, &args),
        Some(Commands::Flatten(args)) => commands::flatten::run(&ctx, &args),
        Some(Commands::Compact(args)) => commands::compact::run(&ctx, &args),
        // ===== Migration & Hooks =====
        Some(Commands::Migrate(args)) => commands::migrate::run(&ctx, &args),
        Some(Commands::Hooks(args)) => commands::hooks_cmd::run(&ctx, &args),
        None => {
            // No subcommand -- print help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    // Handle errors: print message and exit with code 1
    if let Err(e) = result {
        // For JSON mode, output error as JSON
        if cli.global.json {
            let err_json = serde_json::json!({
                "error": format!("{:#}", e),
            });
            if let Ok(s) = serde_json::to_string_pretty(&err_json) {
                eprintln!("{}", s);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
