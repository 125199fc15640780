//! `bd migrate` -- move a legacy single-file database to a versioned store,
//! and reinstall git hooks to the current binary's version.

use anyhow::{Context, Result, bail};

use beads_migrate::{DetectOutcome, Target, detect, doctor_recover, migrate as run_migration};

use crate::cli::{MigrateArgs, MigrateCommands, MigrateHooksArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd migrate` command.
pub fn run(ctx: &RuntimeContext, args: &MigrateArgs) -> Result<()> {
    match &args.command {
        Some(MigrateCommands::Hooks(hooks_args)) => run_hooks(ctx, hooks_args),
        None => run_legacy_migration(ctx, args),
    }
}

fn run_legacy_migration(ctx: &RuntimeContext, args: &MigrateArgs) -> Result<()> {
    if ctx.readonly && !args.dry_run {
        bail!("cannot migrate in read-only mode");
    }

    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;

    let target = match args.target.as_str() {
        "dolt" => Target::Dolt,
        "sqlite" | "git" => Target::Git,
        other => bail!("unknown migration target: {other} (expected 'sqlite' or 'dolt')"),
    };

    let outcome = detect(&beads_dir).context("failed to detect migration state")?;

    match outcome {
        DetectOutcome::NothingToDo => {
            if !ctx.quiet {
                println!("nothing to migrate");
            }
            if ctx.json {
                output_json(&serde_json::json!({"status": "nothing_to_do"}));
            }
            Ok(())
        }
        DetectOutcome::AlreadyMigrated => {
            if !ctx.quiet {
                println!("already migrated; stale legacy file renamed aside");
            }
            if ctx.json {
                output_json(&serde_json::json!({"status": "already_migrated"}));
            }
            Ok(())
        }
        DetectOutcome::ReadyToMigrate { legacy_path } => {
            if args.dry_run {
                if !ctx.quiet {
                    println!(
                        "would migrate {} to {} backend",
                        legacy_path.display(),
                        args.target
                    );
                }
                if ctx.json {
                    output_json(&serde_json::json!({
                        "status": "dry_run",
                        "legacy_path": legacy_path.to_string_lossy(),
                        "target": args.target,
                    }));
                }
                return Ok(());
            }

            match run_migration(&beads_dir, target) {
                Ok(Some(report)) => {
                    if ctx.json {
                        output_json(&serde_json::json!({
                            "status": "migrated",
                            "issues_imported": report.issues_imported,
                            "backup_path": report.backup_path.to_string_lossy(),
                            "commit": report.commit,
                        }));
                    } else if !ctx.quiet {
                        println!(
                            "migrated {} issues to {} backend (backup at {})",
                            report.issues_imported,
                            args.target,
                            report.backup_path.display()
                        );
                    }
                    Ok(())
                }
                Ok(None) => {
                    if !ctx.quiet {
                        println!("nothing to migrate");
                    }
                    Ok(())
                }
                Err(e) => {
                    // Attempt to leave the directory in a recoverable state.
                    if let Ok(recovered) = doctor_recover(&beads_dir) {
                        if recovered && !ctx.quiet {
                            eprintln!("migration failed, recovered legacy state: {e}");
                        }
                    }
                    Err(e.into())
                }
            }
        }
    }
}

fn run_hooks(ctx: &RuntimeContext, args: &MigrateHooksArgs) -> Result<()> {
    if ctx.readonly && !args.dry_run {
        bail!("cannot reinstall hooks in read-only mode");
    }

    let start = args
        .path
        .as_ref()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let hooks_dir = beads_git::hooks::hooks_dir(&start)
        .context("could not locate a git hooks directory from this path")?;

    let statuses = beads_git::hooks::list_status(&hooks_dir);
    let outdated: Vec<_> = statuses
        .iter()
        .filter(|s| s.outdated)
        .map(|s| s.name.clone())
        .collect();

    if args.dry_run {
        if args.json || ctx.json {
            output_json(&serde_json::json!({"dry_run": true, "outdated": outdated}));
        } else if !ctx.quiet {
            println!("would reinstall {} outdated hook(s): {:?}", outdated.len(), outdated);
        }
        return Ok(());
    }

    let mut reinstalled = Vec::new();
    for hook_name in &outdated {
        beads_git::hooks::install_hook(&hooks_dir, hook_name, false)?;
        reinstalled.push(hook_name.clone());
    }

    if args.json || ctx.json {
        output_json(&serde_json::json!({"reinstalled": reinstalled}));
    } else if !ctx.quiet {
        println!("reinstalled {} hook(s): {:?}", reinstalled.len(), reinstalled);
    }
    Ok(())
}
