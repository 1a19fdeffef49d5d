use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for xrspace")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings denied
    Clippy,
    /// Run all tests
    Test,
    /// Build rustdoc for the workspace
    Doc,
    /// Run every bundled demo script through the CLI
    Demo {
        /// Only run demos whose file name contains this
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test()?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test => test()?,
        Commands::Doc => doc()?,
        Commands::Demo { filter } => demo(filter.as_deref())?,
    }

    Ok(())
}

fn cargo(label: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {label}");
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {label} failed");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn test() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

/// Each `demos/<name>.json` script runs with `demos/<name>.yaml` if present.
fn demo(filter: Option<&str>) -> Result<()> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos");
    let mut scripts: Vec<PathBuf> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .filter(|p| {
            filter.is_none_or(|f| p.file_name().is_some_and(|n| n.to_string_lossy().contains(f)))
        })
        .collect();
    scripts.sort();
    if scripts.is_empty() {
        anyhow::bail!("no demo scripts in {}", dir.display());
    }

    for script in scripts {
        let script_arg = script.to_string_lossy().into_owned();
        let config = script.with_extension("yaml");
        let config_arg = config.to_string_lossy().into_owned();
        let mut args = vec!["run", "-q", "-p", "xrspace-cli", "--", "simulate", "--script", script_arg.as_str()];
        if config.exists() {
            args.extend(["--config", config_arg.as_str()]);
        }
        cargo(&format!("demo {}", script.display()), &args)?;
    }
    Ok(())
}
