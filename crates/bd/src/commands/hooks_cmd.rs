//! `bd hooks` -- install, remove, and run beads' managed git hook blocks.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use beads_git::hooks::{self, HookState, MANAGED_HOOKS};

use crate::cli::{HooksArgs, HooksCommands, HooksInstallArgs, HooksRunArgs};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd hooks` command.
pub fn run(ctx: &RuntimeContext, args: &HooksArgs) -> Result<()> {
    match &args.command {
        HooksCommands::Install(install) => run_install(ctx, install),
        HooksCommands::Uninstall => run_uninstall(ctx),
        HooksCommands::List => run_list(ctx),
        HooksCommands::Run(run_args) => run_hook(ctx, run_args),
    }
}

fn resolve_hooks_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    hooks::hooks_dir(&cwd).context("not inside a git repository")
}

fn run_install(ctx: &RuntimeContext, args: &HooksInstallArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot install hooks in read-only mode");
    }
    let hooks_dir = resolve_hooks_dir()?;

    let targets: Vec<&str> = match &args.beads {
        Some(name) => vec![name.as_str()],
        None => MANAGED_HOOKS.to_vec(),
    };

    let mut installed = Vec::new();
    for name in targets {
        let status = hooks::list_status(&hooks_dir)
            .into_iter()
            .find(|s| s.name == name);
        if let Some(status) = status {
            if matches!(status.state, HookState::Foreign) && !args.force && !args.chain {
                bail!(
                    "{name} has a non-beads hook installed; pass --force to overwrite or --chain to wrap it"
                );
            }
        }
        hooks::install_hook(&hooks_dir, name, args.chain)?;
        installed.push(name.to_string());
    }

    if ctx.json {
        output_json(&serde_json::json!({"installed": installed}));
    } else if !ctx.quiet {
        println!("installed {} hook(s): {:?}", installed.len(), installed);
    }
    Ok(())
}

fn run_uninstall(ctx: &RuntimeContext) -> Result<()> {
    if ctx.readonly {
        bail!("cannot uninstall hooks in read-only mode");
    }
    let hooks_dir = resolve_hooks_dir()?;
    for name in MANAGED_HOOKS {
        hooks::uninstall_hook(&hooks_dir, name)?;
    }
    if !ctx.quiet {
        println!("removed beads' managed hooks");
    }
    if ctx.json {
        output_json(&serde_json::json!({"uninstalled": MANAGED_HOOKS}));
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext) -> Result<()> {
    let hooks_dir = resolve_hooks_dir()?;
    let statuses = hooks::list_status(&hooks_dir);

    if ctx.json {
        let payload: Vec<_> = statuses
            .iter()
            .map(|s| {
                let state = match &s.state {
                    HookState::Absent => "absent".to_string(),
                    HookState::Managed { version } => format!("managed(v{version})"),
                    HookState::LegacyShim => "legacy-shim".to_string(),
                    HookState::Foreign => "foreign".to_string(),
                };
                serde_json::json!({"name": s.name, "state": state, "outdated": s.outdated})
            })
            .collect();
        output_json(&payload);
        return Ok(());
    }

    for s in &statuses {
        let state = match &s.state {
            HookState::Absent => "absent".to_string(),
            HookState::Managed { version } => format!("managed (v{version})"),
            HookState::LegacyShim => "legacy shim".to_string(),
            HookState::Foreign => "foreign".to_string(),
        };
        let outdated = if s.outdated { " [outdated]" } else { "" };
        println!("{}: {}{}", s.name, state, outdated);
    }
    Ok(())
}

/// Runs beads' managed logic for a single hook invocation.
///
/// Only `prepare-commit-msg` currently has beads-specific behavior: it
/// appends agent-attribution trailers to the commit message when `GT_ROLE`
/// is set in the environment.
fn run_hook(ctx: &RuntimeContext, args: &HooksRunArgs) -> Result<()> {
    if args.hook == "prepare-commit-msg" {
        if let Ok(role) = std::env::var("GT_ROLE") {
            if let Some(msg_file) = args.args.first() {
                append_agent_trailers(msg_file, &role)?;
            }
        }
    }
    let _ = ctx;
    Ok(())
}

/// `GT_ROLE` is `<rig>/<role>/<agent>`. Appends `Executed-By`, `Rig`, `Role`,
/// and (when present) `Molecule` trailers to the commit message file.
/// Idempotent: skipped if the file already has an `Executed-By:` trailer,
/// so amending a commit doesn't pile up duplicate trailers.
fn append_agent_trailers(msg_file: &str, role: &str) -> Result<()> {
    let existing = std::fs::read_to_string(msg_file).unwrap_or_default();
    if existing.contains("Executed-By:") {
        return Ok(());
    }

    let parts: Vec<&str> = role.splitn(3, '/').collect();
    let (rig, role_name, agent) = match parts.as_slice() {
        [rig, role_name, agent] => (*rig, *role_name, *agent),
        _ => return Ok(()),
    };

    let mut trailers = format!("\nExecuted-By: {agent}\nRig: {rig}\nRole: {role_name}\n");
    if let Ok(molecule) = std::env::var("GT_MOLECULE") {
        if !molecule.is_empty() {
            trailers.push_str(&format!("Molecule: {molecule}\n"));
        }
    }

    let updated = format!("{}{}", existing.trim_end(), trailers);
    std::fs::write(msg_file, updated)?;
    Ok(())
}
