//! Upstream - command line client for the web-core storage API

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upstream_client::config::{Config, DEFAULT_CONFIG_PATH};
use upstream_client::Streamer;
use upstream_core::{parse_shard_size, ParsedSize, ProgressCallback, ShardDescriptor};

#[derive(Parser)]
#[command(name = "upstream")]
#[command(version, about = "Command line client for the web-core storage API", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Server URL (overrides config)
    #[arg(long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file, printing one URI per shard
    Upload {
        /// Path to the file to upload
        #[arg(required = true)]
        file: String,

        /// Size of each shard, e.g. 25m, 512k, 1024b or 1024
        #[arg(long)]
        shard_size: Option<String>,

        /// Bytes read from disk per slice
        #[arg(long)]
        read_size: Option<usize>,
    },

    /// Download shards by URI and join them into one file
    Download {
        /// Shard URI(s) in the form <hash>?key=<key>, in file order
        #[arg(long, required = true, num_args = 1..)]
        uri: Vec<String>,

        /// Destination file (defaults to the first filehash in the current directory)
        #[arg(long)]
        dest: Option<String>,

        /// Bytes written to disk per write
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Initialize configuration
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = Config::resolve(&cli.config)?;
    if let Some(server) = cli.server {
        config.server = server;
    }

    match cli.command {
        Commands::Upload {
            file,
            shard_size,
            read_size,
        } => {
            upload_file(&file, shard_size.as_deref(), read_size, &config).await?;
        }
        Commands::Download {
            uri,
            dest,
            chunk_size,
        } => {
            download_file(&uri, dest.as_deref(), chunk_size, &config).await?;
        }
        Commands::Init => {
            init_config()?;
        }
    }

    Ok(())
}

async fn upload_file(
    file: &str,
    shard_size: Option<&str>,
    read_size: Option<usize>,
    config: &Config,
) -> Result<()> {
    let path = Streamer::check_path(file)?;

    let shard_size = match shard_size {
        Some(text) => match parse_shard_size(text)? {
            ParsedSize::Bytes(bytes) => bytes,
            ParsedSize::Unsupported(unit) => {
                anyhow::bail!("Unsupported shard size unit '{}': use b, k or m", unit)
            }
        },
        None => config.transfer.shard_size,
    };
    let read_size = read_size.unwrap_or(config.transfer.read_size);

    let streamer = Streamer::from_config(config).await?;
    tracing::info!("Connected to {}", streamer.server());

    let shards = streamer
        .upload_file(&path, shard_size, read_size, |index, count| {
            if index > 0 {
                eprintln!("\rUploading shard {}/{}: 100%", index, count);
            }
            Some(shard_progress(index, count, shard_size))
        })
        .await?;
    eprintln!("\rUploading shard {}/{}: 100%", shards.len(), shards.len());

    for shard in &shards {
        println!("{}", shard.uri()?);
    }

    Ok(())
}

/// Progress line for one shard, redrawn every 10 percent
fn shard_progress(index: usize, count: usize, shard_size: u64) -> ProgressCallback {
    let start = index as u64 * shard_size;
    let mut last_step = None;

    Box::new(move |pos, total| {
        let percent = match total {
            0 => 100,
            total => pos.saturating_sub(start) * 100 / total,
        };
        if last_step != Some(percent / 10) {
            last_step = Some(percent / 10);
            eprint!("\rUploading shard {}/{}: {:>3}%", index + 1, count, percent);
        }
    })
}

async fn download_file(
    uris: &[String],
    dest: Option<&str>,
    chunk_size: Option<usize>,
    config: &Config,
) -> Result<()> {
    let shards = uris
        .iter()
        .map(|uri| ShardDescriptor::from_uri(uri))
        .collect::<upstream_core::Result<Vec<_>>>()?;
    let chunk_size = chunk_size.unwrap_or(config.transfer.download_chunk_size);

    let streamer = Streamer::from_config(config).await?;
    tracing::info!("Connected to {}", streamer.server());
    tracing::info!("Downloading {} shard(s)", shards.len());

    let path = streamer
        .download(&shards, dest.map(Path::new), chunk_size)
        .await?;

    println!("Downloaded to {}", path.display());
    Ok(())
}

fn init_config() -> Result<()> {
    let config_dir = Config::default_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        tracing::info!("Created config directory: {}", config_dir.display());
    }

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        println!("Config already exists at: {}", config_path.display());
        return Ok(());
    }

    let toml = toml::to_string_pretty(&Config::default())?;
    std::fs::write(&config_path, toml)?;

    println!("Initialized upstream at: {}", config_dir.display());

    Ok(())
}
