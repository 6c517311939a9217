use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for vectormap")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc in order
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates with warnings denied
    Clippy,
    /// Run tests, optionally for a single package
    Test {
        /// Package name, e.g. vectormap-camera
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Build rustdoc for the workspace
    Doc,
    /// Run the scripted demo through vectormap-cli
    Demo {
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            fmt()?;
            clippy()?;
            test(None)?;
            doc()?;
        }
        Commands::Fmt => fmt()?,
        Commands::Clippy => clippy()?,
        Commands::Test { package } => test(package.as_deref())?,
        Commands::Doc => doc()?,
        Commands::Demo { verbose } => demo(verbose)?,
    }

    Ok(())
}

fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("{step} failed ({status})");
    }
    Ok(())
}

fn fmt() -> Result<()> {
    cargo("fmt check", &["fmt", "--all", "--", "--check"])
}

fn clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn test(package: Option<&str>) -> Result<()> {
    match package {
        Some(p) => cargo("tests", &["test", "-p", p]),
        None => cargo("tests", &["test", "--workspace"]),
    }
}

fn doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn demo(verbose: bool) -> Result<()> {
    let mut args = vec!["run", "-p", "vectormap-cli", "--"];
    if verbose {
        args.push("--verbose");
    }
    args.push("demo");
    cargo("demo", &args)
}
