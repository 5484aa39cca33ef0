//! svault: sink-backed encrypted file store CLI
//!
//! Commands:
//!   upload <path>            - chunk, encrypt, and distribute a file
//!   download <uuid>          - reassemble a stored file to disk
//!   refresh <uuid>           - refresh a file's expiring sink links
//!   delete <uuid>            - remove a file and its chunk records
//!   config show              - display the effective configuration
//!
//! The master key is read from the file named in `crypto.master_key_file`
//! or, when unset, from the SVAULT_MASTER_KEY environment variable
//! (64 hex chars).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;

use svault_core::config::VaultConfig;
use svault_crypto::MasterKey;
use svault_engine::{HttpTransport, ProgressFn, Vault};
use svault_store::JsonStore;

#[derive(Parser, Debug)]
#[command(
    name = "svault",
    version,
    about = "Sink-backed encrypted file store",
    long_about = "svault: split files into encrypted chunks, distribute them across \
                  rate-limited blob sinks, and reassemble them on demand"
)]
struct Cli {
    /// Path to svault.toml configuration file
    #[arg(long, short = 'c', env = "SVAULT_CONFIG", default_value = "/etc/svault/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Local file path
        path: PathBuf,
        /// Stored name (default: the file's name)
        #[arg(long)]
        name: Option<String>,
        /// MIME type (default: guessed from the extension)
        #[arg(long)]
        media_type: Option<String>,
    },

    /// Download a stored file by uuid
    Download {
        uuid: String,
        /// Output path (default: the stored name in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Refresh a file's expiring sink links
    Refresh { uuid: String },

    /// Delete a file and its chunk records (sink blobs are orphaned)
    Delete { uuid: String },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

fn load_config(path: &Path) -> Result<VaultConfig> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(VaultConfig::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
}

fn load_master_key(config: &VaultConfig) -> Result<MasterKey> {
    let hex_str = match &config.crypto.master_key_file {
        Some(path) => {
            let path = expand_tilde(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading master key file: {}", path.display()))?
        }
        None => std::env::var("SVAULT_MASTER_KEY")
            .context("SVAULT_MASTER_KEY is not set and crypto.master_key_file is unset")?,
    };
    Ok(MasterKey::from_hex(&hex_str)?)
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}

fn build_vault(config: VaultConfig) -> Result<Vault> {
    let master_key = load_master_key(&config)?;
    let store = Arc::new(JsonStore::open(&expand_tilde(&config.store.path))?);
    let transport = Arc::new(HttpTransport::new(config.refresh.endpoint.clone())?);
    Ok(Vault::new(config, master_key, store, transport)?)
}

fn chunk_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} chunks {msg}")
            .unwrap()
            .progress_chars("=> "),
    );
    bar
}

async fn cmd_upload(
    vault: &Vault,
    path: &Path,
    name: Option<String>,
    media_type: Option<String>,
) -> Result<()> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading: {}", path.display()))?;

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".into())
    });
    let media_type = media_type.or_else(|| {
        mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
    });

    let bar = chunk_progress_bar();
    let bar_handle = bar.clone();
    let progress: ProgressFn = Box::new(move |done, total| {
        bar_handle.set_length(total);
        bar_handle.set_position(done);
    });

    let record = vault
        .upload_with_progress(Bytes::from(data), &name, media_type, &progress)
        .await?;
    bar.finish_with_message("done");

    println!("{}  {}  {} bytes", record.uuid, record.name, record.size_bytes);
    Ok(())
}

async fn cmd_download(vault: &Vault, uuid: &str, output: Option<PathBuf>) -> Result<()> {
    let mut stream = vault.open(uuid).await?;
    let output = output.unwrap_or_else(|| PathBuf::from(&stream.file().name));

    let mut file = tokio::fs::File::create(&output)
        .await
        .with_context(|| format!("creating: {}", output.display()))?;

    let bar = ProgressBar::new(stream.content_length());
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {bytes}/{total_bytes} {msg}")
            .unwrap()
            .progress_chars("=> "),
    );

    while let Some(item) = stream.next().await {
        let bytes = item?;
        file.write_all(&bytes).await?;
        bar.inc(bytes.len() as u64);
    }
    file.flush().await?;
    bar.finish_with_message("done");

    println!("{} -> {}", uuid, output.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.level.clone())),
        )
        .init();

    match cli.command {
        Commands::Upload {
            path,
            name,
            media_type,
        } => {
            let vault = build_vault(config)?;
            cmd_upload(&vault, &path, name, media_type).await?;
        }
        Commands::Download { uuid, output } => {
            let vault = build_vault(config)?;
            cmd_download(&vault, &uuid, output).await?;
        }
        Commands::Refresh { uuid } => {
            let vault = build_vault(config)?;
            let refreshed = vault.refresh_file(&uuid).await?;
            println!("{refreshed} link(s) refreshed");
        }
        Commands::Delete { uuid } => {
            let vault = build_vault(config)?;
            vault.delete(&uuid).await?;
            println!("{uuid} deleted");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
            }
        },
    }

    Ok(())
}
