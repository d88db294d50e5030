//! hypernotes command-line client.
//!
//! Runs one filesystem operation against a local directory grant.
//!
//! Usage:
//!   hypernotes --root ~/Notes write notes/today.md "# Today"
//!   hypernotes --root ~/Notes ls notes
//!   hypernotes --root ~/Notes cp notes archive/notes --to-directory BACKUP
//!
//! The root, metadata database and default directory can also be set in
//! `~/.config/hypernotes/fs.toml`; flags win over the file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use hypernotes_fs::config::config_file_path;
use hypernotes_fs::{CopyOptions, Encoding, Filesystem, FsConfig, Session, WriteOptions};

/// Path-addressed access to a hypernotes storage root.
#[derive(Parser, Debug)]
#[command(name = "hypernotes")]
#[command(about = "Read and write files under a hypernotes storage root")]
struct Args {
    /// Directory to grant as the storage root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Config file (default: ~/.config/hypernotes/fs.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Named logical root that paths are relative to
    #[arg(short, long, global = true)]
    directory: Option<String>,

    /// SQLite file for the metadata cache
    #[arg(long, global = true)]
    metadata: Option<PathBuf>,

    /// Print structured results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a file's content
    Read {
        path: String,
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<Encoding>,
    },
    /// Create or overwrite a file
    Write {
        path: String,
        content: String,
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<Encoding>,
        /// Fail instead of creating missing parent directories
        #[arg(long)]
        no_parents: bool,
    },
    /// Append to a file, creating it if needed
    Append {
        path: String,
        content: String,
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<Encoding>,
    },
    /// Delete a file
    Rm { path: String },
    /// Create a directory and its missing ancestors
    Mkdir {
        path: String,
        #[arg(short, long)]
        parents: bool,
    },
    /// Remove a directory
    Rmdir {
        path: String,
        #[arg(short, long)]
        recursive: bool,
    },
    /// List a directory
    Ls {
        #[arg(default_value = "")]
        path: String,
    },
    /// Describe a file or directory
    Stat { path: String },
    /// Print the canonical URI of an entry
    Uri { path: String },
    /// Move a file or directory tree
    Mv {
        from: String,
        to: String,
        #[arg(long)]
        to_directory: Option<String>,
    },
    /// Copy a file or directory tree
    Cp {
        from: String,
        to: String,
        #[arg(long)]
        to_directory: Option<String>,
    },
    /// Drop the metadata cache
    ClearMetadata,
}

fn parse_encoding(s: &str) -> Result<Encoding, String> {
    Encoding::from_str(s).ok_or_else(|| format!("unknown encoding {:?} (base64, utf8, ascii, utf16)", s))
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hypernotes: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Resolve configuration and open a session on the granted root.
async fn open(args: &Args) -> Result<(Session, String)> {
    let mut config = FsConfig::load(args.config.as_deref())?;
    if let Some(root) = &args.root {
        config.root = Some(root.clone());
    }
    if let Some(metadata) = &args.metadata {
        config.metadata_path = Some(metadata.clone());
    }
    if config.root.is_none() {
        let location = args
            .config
            .clone()
            .or_else(config_file_path)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "the config file".to_string());
        bail!("no storage root: pass --root or set `root` in {}", location);
    }

    let directory = args
        .directory
        .clone()
        .unwrap_or_else(|| config.default_directory.clone());
    let session = Filesystem::from_config(&config)?
        .request_access()
        .await
        .context("requesting storage access")?;
    tracing::debug!(root = %session.root_uri(), %directory, "session open");
    Ok((session, directory))
}

async fn run(args: Args) -> Result<()> {
    let (session, dir) = open(&args).await?;
    let dir = dir.as_str();

    match &args.command {
        Command::Read { path, encoding } => {
            print!("{}", session.read_file(dir, path, *encoding).await?);
        }
        Command::Write {
            path,
            content,
            encoding,
            no_parents,
        } => {
            let options = WriteOptions {
                encoding: *encoding,
                create_parents: !no_parents,
            };
            println!("{}", session.write_file_with(dir, path, content, options).await?);
        }
        Command::Append {
            path,
            content,
            encoding,
        } => session.append_file(dir, path, content, *encoding).await?,
        Command::Rm { path } => session.delete_file(dir, path).await?,
        Command::Mkdir { path, parents } => session.mkdir(dir, path, *parents).await?,
        Command::Rmdir { path, recursive } => session.rmdir(dir, path, *recursive).await?,
        Command::Ls { path } => {
            let listing = session.readdir(dir, path).await?;
            if args.json {
                print_json(&listing)?;
            } else {
                for entry in listing {
                    println!("{:>9}  {:>13}  {}", entry.kind, entry.size, entry.name);
                }
            }
        }
        Command::Stat { path } => {
            let stat = session.stat(dir, path).await?;
            if args.json {
                print_json(&stat)?;
            } else {
                println!("kind: {}", stat.kind);
                println!("size: {}", stat.size);
                println!("created_at: {}", stat.created_at);
                println!("modified_at: {}", stat.modified_at);
                println!("uri: {}", stat.uri);
            }
        }
        Command::Uri { path } => println!("{}", session.get_uri(dir, path).await?),
        Command::Mv {
            from,
            to,
            to_directory,
        } => session.rename(&copy_options(dir, from, to, to_directory)).await?,
        Command::Cp {
            from,
            to,
            to_directory,
        } => println!(
            "{}",
            session.copy(&copy_options(dir, from, to, to_directory)).await?
        ),
        Command::ClearMetadata => session.clear_metadata()?,
    }
    Ok(())
}

fn copy_options(dir: &str, from: &str, to: &str, to_directory: &Option<String>) -> CopyOptions {
    let options = CopyOptions::new(dir, from, to);
    match to_directory {
        Some(target) => options.with_to_directory(target.clone()),
        None => options,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
