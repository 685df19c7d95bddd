use std::{
    fs,
    net::SocketAddrV4,
    path::{Path, PathBuf},
    time::Duration,
};

use bencode_handshake::{
    client, decode::decode, metainfo::Metainfo, peer_id, tracker, tracker::Peer, DEFAULT_PORT,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Cli {
    /// Seconds to wait for the tracker or a peer before giving up
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Port reported to the tracker
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a bencoded value and print it as JSON
    Decode { value: String },
    /// Print tracker URL, length, info hash and piece hashes of a torrent
    Info { metainfo: PathBuf },
    /// Print peers reported by the tracker of a torrent
    Peers { metainfo: PathBuf },
    /// Handshake with a peer and print its peer id
    Handshake { metainfo: PathBuf, peer: SocketAddrV4 },
}

fn read_metainfo(path: &Path) -> Result<Metainfo, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("Unable to read file {}: {}", path.display(), e))?;
    let decoded = decode(&bytes).map_err(|e| e.to_string())?;
    Metainfo::new(&decoded).map_err(|e| e.to_string())
}

async fn run(cli: Cli) -> Result<(), String> {
    let deadline = Duration::from_secs(cli.timeout_secs);
    match cli.command {
        Command::Decode { value } => {
            let decoded = decode(value.as_bytes()).map_err(|e| e.to_string())?;
            println!("{}", decoded.to_json());
        }
        Command::Info { metainfo } => {
            let metainfo = read_metainfo(&metainfo)?;
            println!("Tracker URL: {}", metainfo.announce);
            println!("Length: {}", metainfo.info.length);
            println!("Info Hash: {}", metainfo.info_hash_hex());
            println!("Piece Length: {}", metainfo.info.piece_length);
            println!("Piece Hashes:");
            for hash in metainfo.info.pieces() {
                println!("{}", hex::encode(hash));
            }
        }
        Command::Peers { metainfo } => {
            let metainfo = read_metainfo(&metainfo)?;
            let response = tracker::announce(&metainfo, &peer_id::generate(), cli.port, deadline)
                .await
                .map_err(|e| e.to_string())?;
            for peer in response.peers {
                println!("{}", peer);
            }
        }
        Command::Handshake { metainfo, peer } => {
            let metainfo = read_metainfo(&metainfo)?;
            let their_peer_id = client::handshake(
                Peer::from(peer),
                metainfo.info_hash,
                peer_id::generate(),
                deadline,
            )
            .await
            .map_err(|e| e.to_string())?;
            println!("Peer ID: {}", hex::encode(their_peer_id));
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
