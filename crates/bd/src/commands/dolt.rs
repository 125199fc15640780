//! `bd dolt` -- version-control operations for the beads directory.
//!
//! Despite the name, these subcommands dispatch through the
//! [`beads_storage::VcEngine`] selected by `metadata.json`: `GitEngine` for
//! the `sqlite` backend (the default, since the database lives inside the
//! repository) or `DoltEngine` once a directory has been migrated to `dolt`.

use std::fs;

use anyhow::{bail, Context, Result};

use beads_storage::metadata::{load_metadata, save_metadata, Backend};
use beads_storage::Storage;

use crate::cli::{DoltArgs, DoltCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd dolt` command.
pub fn run(ctx: &RuntimeContext, args: &DoltArgs) -> Result<()> {
    match &args.command {
        DoltCommands::Start => run_start(ctx),
        DoltCommands::Stop => run_stop(ctx),
        DoltCommands::Status => run_status(ctx),
        DoltCommands::Show => run_show(ctx),
        DoltCommands::Set(set_args) => run_set(ctx, &set_args.key, &set_args.value, set_args.update_config),
        DoltCommands::Test => run_test(ctx),
        DoltCommands::Commit(commit_args) => run_commit(ctx, commit_args.message.as_deref()),
        DoltCommands::Push(push_args) => run_push(ctx, push_args.force),
        DoltCommands::Pull => run_pull(ctx),
    }
}

fn run_start(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let metadata = load_metadata(&beads_dir)?;
    if !matches!(metadata.backend, Backend::Dolt) {
        bail!("this beads directory uses the sqlite backend; there is no server to start");
    }

    let dolt_dir = beads_dir.join("dolt");
    let pid_path = beads_dir.join("dolt-server.pid");
    let log_path = beads_dir.join("dolt-server.log");

    if beads_lockfile::pid_file_is_live(&pid_path) {
        if let Some(pid) = beads_lockfile::read_pid_file(&pid_path)? {
            if !ctx.quiet {
                println!("dolt sql-server already running (pid {pid})");
            }
            return Ok(());
        }
    }

    let log_file = fs::File::create(&log_path)
        .with_context(|| format!("failed to create {}", log_path.display()))?;
    let child = std::process::Command::new("dolt")
        .args(["sql-server"])
        .current_dir(&dolt_dir)
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()
        .context("failed to spawn dolt sql-server")?;

    beads_lockfile::atomic_write(&pid_path, child.id().to_string().as_bytes())?;
    if !ctx.quiet {
        println!("dolt sql-server started (pid {})", child.id());
    }
    Ok(())
}

fn run_stop(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let pid_path = beads_dir.join("dolt-server.pid");

    let Some(pid) = beads_lockfile::read_pid_file(&pid_path)? else {
        if !ctx.quiet {
            println!("dolt sql-server is not running");
        }
        return Ok(());
    };

    if beads_lockfile::pid_file_is_live(&pid_path) {
        unsafe {
            libc_kill(pid as i32, 15);
        }
    }
    let _ = fs::remove_file(&pid_path);
    if !ctx.quiet {
        println!("dolt sql-server stopped (pid {pid})");
    }
    Ok(())
}

extern "C" {
    #[link_name = "kill"]
    fn libc_kill(pid: i32, sig: i32) -> i32;
}

fn run_status(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let metadata = load_metadata(&beads_dir)?;
    let pid_path = beads_dir.join("dolt-server.pid");
    let running = beads_lockfile::pid_file_is_live(&pid_path);

    if ctx.json {
        output_json(&serde_json::json!({
            "backend": matches!(metadata.backend, Backend::Dolt),
            "server_running": running,
        }));
        return Ok(());
    }

    match metadata.backend {
        Backend::Dolt => println!(
            "backend: dolt\nserver: {}",
            if running { "running" } else { "stopped" }
        ),
        Backend::Sqlite => println!("backend: sqlite (versioned via the surrounding git repository)"),
    }
    Ok(())
}

fn run_show(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let metadata = load_metadata(&beads_dir)?;
    if ctx.json {
        output_json(&metadata);
    } else {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
    }
    Ok(())
}

fn run_set(ctx: &RuntimeContext, key: &str, value: &str, update_config: bool) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;

    if key == "auto-commit" || key == "auto_commit" {
        if update_config {
            let mut config = beads_config::config::load_config(&beads_dir)?;
            config.dolt.auto_commit = value.to_string();
            beads_config::config::save_config(&beads_dir, &config)?;
        }
        if !ctx.quiet {
            println!("set {key} = {value}");
        }
        return Ok(());
    }

    let mut metadata = load_metadata(&beads_dir)?;
    match key {
        "host" => metadata.host = Some(value.to_string()),
        "port" => metadata.port = Some(value.parse().context("port must be a number")?),
        "user" => metadata.user = Some(value.to_string()),
        "password" => metadata.password = Some(value.to_string()),
        "tls" => metadata.tls = value.parse().context("tls must be true or false")?,
        "database" => metadata.database = value.to_string(),
        other => bail!("unknown dolt config key '{other}'"),
    }
    save_metadata(&beads_dir, &metadata)?;

    if !ctx.quiet {
        println!("set {key} = {value}");
    }
    Ok(())
}

fn run_test(ctx: &RuntimeContext) -> Result<()> {
    let store = ctx.open_store()?;
    match store.get_current_commit() {
        Ok(commit) => {
            if ctx.json {
                output_json(&serde_json::json!({"ok": true, "commit": commit}));
            } else {
                println!("connection ok (current commit: {commit})");
            }
            Ok(())
        }
        Err(e) => {
            if ctx.json {
                output_json(&serde_json::json!({"ok": false, "error": e.to_string()}));
                Ok(())
            } else {
                bail!("connection test failed: {e}");
            }
        }
    }
}

fn run_commit(ctx: &RuntimeContext, message: Option<&str>) -> Result<()> {
    let store = ctx.open_store()?;
    let committed = store.commit(message)?;
    if ctx.json {
        output_json(&serde_json::json!({"committed": committed}));
    } else if committed {
        println!("committed pending changes");
    } else {
        println!("nothing to commit");
    }
    Ok(())
}

fn run_push(ctx: &RuntimeContext, force: bool) -> Result<()> {
    let store = ctx.open_store()?;
    if !store.has_remote()? {
        bail!("no remote configured");
    }
    store.push(force)?;
    if !ctx.quiet {
        println!("pushed");
    }
    Ok(())
}

fn run_pull(ctx: &RuntimeContext) -> Result<()> {
    let store = ctx.open_store()?;
    store.pull()?;
    if !ctx.quiet {
        println!("pulled");
    }
    Ok(())
}
