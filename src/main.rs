//! fernetfs - an encrypted filesystem overlay.
//!
//! Stores files and directories under opaque names inside a host directory,
//! with every name listing and file content encrypted.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use fernetfs::config::{DEFAULT_INNER_ITERATIONS, DEFAULT_OUTER_ITERATIONS, DEFAULT_SALT_SIZE};
use fernetfs::{Filesystem, FsConfig};
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "fernetfs")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Encrypted filesystem overlay with opaque on-disk names",
    long_about = "Stores a directory tree inside a host directory: names are replaced by random identifiers and every listing and file is encrypted with a key derived from your password."
)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Key derivation iterations for the master record
    #[arg(long, global = true, default_value_t = DEFAULT_OUTER_ITERATIONS)]
    iterations: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Root directory of the encrypted tree
    root: PathBuf,

    /// Logical path inside the tree
    path: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new filesystem in an empty directory
    Init {
        /// Root directory (created if missing)
        root: PathBuf,

        /// Key derivation iterations for every other container
        #[arg(long, default_value_t = DEFAULT_INNER_ITERATIONS)]
        inner_iterations: u32,

        /// Salt size in bytes for every container
        #[arg(long, default_value_t = DEFAULT_SALT_SIZE)]
        salt_size: usize,
    },

    /// List a directory
    Ls {
        /// Root directory of the encrypted tree
        root: PathBuf,

        /// Directory to list (default: /)
        #[arg(default_value = "/")]
        path: String,
    },

    /// Create a directory
    Mkdir(Target),

    /// Write a file
    Write {
        #[command(flatten)]
        target: Target,

        /// Input file to write
        #[arg(long, conflicts_with = "data")]
        input: Option<PathBuf>,

        /// String data to write
        #[arg(long, conflicts_with = "input")]
        data: Option<String>,
    },

    /// Read a file
    Read {
        #[command(flatten)]
        target: Target,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Delete a file
    Rm(Target),

    /// Delete a directory
    Rmdir {
        #[command(flatten)]
        target: Target,

        /// Delete everything below it as well
        #[arg(short, long)]
        recursive: bool,
    },

    /// Edit a file through a plaintext copy in RAM
    Edit {
        #[command(flatten)]
        target: Target,

        /// Command to run; the copy's path is appended as its last argument
        #[arg(long, env = "EDITOR", default_value = "vi")]
        command: String,

        /// Directory for the plaintext copy (default: /dev/shm)
        #[arg(long, env = "FERNETFS_RAM_DIR")]
        ram_dir: Option<PathBuf>,
    },

    /// Check every container in the tree
    Verify {
        /// Root directory of the encrypted tree
        root: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "fernetfs=debug" } else { "fernetfs=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let iterations = cli.iterations;
    match cli.command {
        Commands::Init {
            root,
            inner_iterations,
            salt_size,
        } => cmd_init(&root, FsConfig::new(iterations, salt_size, inner_iterations)),

        Commands::Ls { root, path } => cmd_ls(&root, &path, iterations),

        Commands::Mkdir(target) => cmd_mkdir(&target, iterations),

        Commands::Write {
            target,
            input,
            data,
        } => cmd_write(&target, input, data, iterations),

        Commands::Read { target, output } => cmd_read(&target, output, iterations),

        Commands::Rm(target) => cmd_rm(&target, iterations),

        Commands::Rmdir { target, recursive } => cmd_rmdir(&target, recursive, iterations),

        Commands::Edit {
            target,
            command,
            ram_dir,
        } => cmd_edit(&target, &command, ram_dir, iterations),

        Commands::Verify { root } => cmd_verify(&root, iterations),
    }
}

fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Ok(Zeroizing::new(password)),
        Err(_) => {
            // No terminal: read one line from stdin instead.
            eprint!("{}", prompt);
            io::stderr().flush()?;
            let mut password = String::new();
            io::stdin()
                .lock()
                .read_line(&mut password)
                .context("failed to read password")?;
            Ok(Zeroizing::new(password.trim_end_matches(['\r', '\n']).to_string()))
        }
    }
}

fn mount(root: &Path, iterations: u32) -> Result<Filesystem> {
    let password = prompt_password("Password: ")?;
    Filesystem::mount(password.as_bytes(), root, iterations)
        .with_context(|| format!("failed to mount {}", root.display()))
}

fn cmd_init(root: &Path, config: FsConfig) -> Result<()> {
    let password = prompt_password("Enter password: ")?;
    let confirm = prompt_password("Confirm password: ")?;

    if *password != *confirm {
        bail!("passwords do not match");
    }

    Filesystem::create(password.as_bytes(), root, config)
        .with_context(|| format!("failed to create filesystem in {}", root.display()))?;

    println!("Filesystem created in {}", root.display());
    println!("  Outer iterations: {}", config.outer_iterations);
    println!("  Inner iterations: {}", config.inner_iterations);
    println!("  Salt size:        {} bytes", config.salt_size);

    Ok(())
}

fn cmd_ls(root: &Path, path: &str, iterations: u32) -> Result<()> {
    let fs = mount(root, iterations)?;
    let entries = fs.list(path)?;

    if entries.is_empty() {
        println!("(empty)");
    } else {
        for (name, kind) in entries {
            let type_char = match kind {
                fernetfs::EntryKind::Directory => 'd',
                fernetfs::EntryKind::File => '-',
            };
            println!("{} {}", type_char, name);
        }
    }

    Ok(())
}

fn cmd_mkdir(target: &Target, iterations: u32) -> Result<()> {
    let fs = mount(&target.root, iterations)?;

    fs.mkdir(&target.path)?;
    println!("Created directory {}", target.path);

    Ok(())
}

fn cmd_write(
    target: &Target,
    input: Option<PathBuf>,
    data: Option<String>,
    iterations: u32,
) -> Result<()> {
    let fs = mount(&target.root, iterations)?;

    let content = match (input, data) {
        (Some(path), _) => std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, Some(s)) => s.into_bytes(),
        (None, None) => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };

    fs.write(&target.path, &content)?;
    println!("Wrote {} bytes to {}", content.len(), target.path);

    Ok(())
}

fn cmd_read(target: &Target, output: Option<PathBuf>, iterations: u32) -> Result<()> {
    let fs = mount(&target.root, iterations)?;
    let data = Zeroizing::new(fs.read(&target.path)?);

    match output {
        Some(path) => {
            std::fs::write(&path, &*data)?;
            println!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => {
            io::stdout().write_all(&data)?;
        }
    }

    Ok(())
}

fn cmd_rm(target: &Target, iterations: u32) -> Result<()> {
    let fs = mount(&target.root, iterations)?;

    fs.remove_file(&target.path)?;
    println!("Deleted {}", target.path);

    Ok(())
}

fn cmd_rmdir(target: &Target, recursive: bool, iterations: u32) -> Result<()> {
    let fs = mount(&target.root, iterations)?;

    fs.remove_directory(&target.path, recursive)
        .with_context(|| format!("failed to delete directory {}", target.path))?;
    println!("Deleted directory {}", target.path);

    Ok(())
}

fn cmd_edit(
    target: &Target,
    command: &str,
    ram_dir: Option<PathBuf>,
    iterations: u32,
) -> Result<()> {
    let mut fs = mount(&target.root, iterations)?;
    if let Some(dir) = ram_dir {
        fs.set_ram_dir(dir);
    }

    let mut session = fs.open_as_ram_edit(&target.path)?;
    session
        .run(command)
        .with_context(|| format!("editing {} failed", target.path))?;

    Ok(())
}

fn cmd_verify(root: &Path, iterations: u32) -> Result<()> {
    let fs = mount(root, iterations)?;
    let report = fs.verify()?;

    println!("Verification Report");
    println!("===================");
    println!("Directories:         {}", report.directories);
    println!("Containers verified: {}", report.containers_verified);

    for path in &report.failed {
        println!("  FAILED    {}", path.display());
    }
    for path in &report.orphans {
        println!("  ORPHAN    {}", path.display());
    }
    for path in &report.dangling {
        println!("  DANGLING  {}", path.display());
    }

    if report.is_clean() {
        println!();
        println!("All containers authenticated");
        Ok(())
    } else {
        bail!(
            "{} failed, {} orphan, {} dangling",
            report.failed.len(),
            report.orphans.len(),
            report.dangling.len()
        )
    }
}
