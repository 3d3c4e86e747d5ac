//! Command-line client for FileDepot.

mod client;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filedepot_protocol::constants::DEFAULT_CHUNK_SIZE;

use crate::client::{DepotClient, name_from_path};

#[derive(Parser)]
#[command(name = "depot", about = "FileDepot command-line client", version)]
struct Cli {
    /// Server address.
    #[arg(long, default_value = "ws://127.0.0.1:5000")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a file.
    Upload {
        /// File to upload.
        file: PathBuf,
        /// Object name (defaults to the file name).
        #[arg(long)]
        name: Option<String>,
        /// Chunk size in bytes.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
    },
    /// Download an object.
    Download {
        /// Object name.
        name: String,
        /// Output path (defaults to the object name).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show an object's metadata.
    Stat {
        /// Object name.
        name: String,
    },
    /// Delete an object.
    Delete {
        /// Object name.
        name: String,
    },
    /// Upload a small two-chunk greeting and read it back.
    Demo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let mut client = DepotClient::connect(&cli.addr).await?;

    match cli.command {
        Command::Upload {
            file,
            name,
            chunk_size,
        } => {
            let name = match name.or_else(|| name_from_path(&file)) {
                Some(n) => n,
                None => anyhow::bail!("cannot derive an object name from {}", file.display()),
            };
            let ack = client.upload(&file, &name, chunk_size).await?;
            println!(
                "{} ({} bytes, tier of record: {})",
                ack.message, ack.size, ack.tier_of_record
            );
        }
        Command::Download { name, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&name));
            let done = client.download(&name, &output).await?;
            println!("downloaded {} ({} bytes) to {}", done.name, done.size, output.display());
        }
        Command::Stat { name } => {
            let info = client.stat(&name).await?;
            println!("name:          {}", info.name);
            println!("size:          {} bytes", info.size);
            println!("last modified: {}", info.last_modified.to_rfc3339());
            println!("version:       {}", info.version);
            println!("tier:          {}", info.tier_of_record);
        }
        Command::Delete { name } => {
            let ack = client.delete(&name).await?;
            println!("{}", ack.message);
        }
        Command::Demo => {
            let chunks: [&[u8]; 2] = [b"Hello", b"World!"];
            let ack = client.upload_chunks("greeting.txt", &chunks).await?;
            println!(
                "{} ({} bytes, tier of record: {})",
                ack.message, ack.size, ack.tier_of_record
            );

            let out = std::env::temp_dir().join("greeting.txt");
            let done = client.download("greeting.txt", &out).await?;
            let body = tokio::fs::read(&out).await?;
            println!(
                "read back {} bytes: {:?}",
                done.size,
                String::from_utf8_lossy(&body)
            );
        }
    }

    Ok(())
}
