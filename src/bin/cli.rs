//! noxious CLI tool
//!
//! Key management and envelope tooling for noxious chat nodes.

use clap::{Parser, Subcommand};
use noxious::crypto::{Identity, DEFAULT_KEY_BITS};
use noxious::protocol::{self, Envelope};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// noxious: signed introductions for peer-to-peer chat
#[derive(Parser)]
#[command(name = "noxious")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Private key file (default: ~/.noxious/privkey.pem)
    #[arg(long)]
    priv_key: Option<PathBuf>,

    /// Public key file (default: ~/.noxious/pubkey.pem)
    #[arg(long)]
    pub_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new RSA key pair
    Init {
        /// Force overwrite existing keys
        #[arg(short, long)]
        force: bool,

        /// Key size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },

    /// Display your public key
    Identity,

    /// Print a signed introduction envelope, ready to POST to a peer
    Introduce {
        /// Your address
        #[arg(short, long)]
        from: String,

        /// The peer's address
        #[arg(short, long, default_value = "")]
        to: String,
    },

    /// Validate and verify an envelope locally
    Verify {
        /// Envelope JSON file, or "-" for stdin
        envelope: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let priv_key = cli.priv_key.unwrap_or_else(|| default_key_path("privkey.pem"));
    let pub_key = cli.pub_key.unwrap_or_else(|| default_key_path("pubkey.pem"));

    match cli.command {
        Commands::Init { force, bits } => cmd_init(&priv_key, &pub_key, force, bits),
        Commands::Identity => cmd_identity(&priv_key),
        Commands::Introduce { from, to } => cmd_introduce(&priv_key, &from, &to),
        Commands::Verify { envelope } => cmd_verify(&envelope),
    }
}

fn default_key_path(file: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".noxious")
        .join(file)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn load_identity(path: &Path) -> Identity {
    if !path.exists() {
        eprintln!("Error: No key pair found at {:?}", path);
        eprintln!("Run 'noxious init' to create one.");
        std::process::exit(1);
    }

    Identity::load(path).unwrap_or_else(|e| fail(format!("Invalid private key file: {}", e)))
}

fn cmd_init(priv_key: &Path, pub_key: &Path, force: bool, bits: usize) {
    if priv_key.exists() && !force {
        eprintln!("Key pair already exists at {:?}", priv_key);
        eprintln!("Use --force to overwrite.");
        std::process::exit(1);
    }

    println!("Generating {}-bit RSA key pair...", bits);
    let identity = Identity::generate(bits).unwrap_or_else(|e| fail(e));
    identity.save(priv_key, pub_key).unwrap_or_else(|e| fail(e));

    println!("Key pair created successfully!");
    println!();
    println!("Fingerprint: {}", identity.public_key().fingerprint());
    println!("Private key: {:?}", priv_key);
    println!("Public key:  {:?}", pub_key);
    println!();
    println!("IMPORTANT: Back up your private key securely!");
}

fn cmd_identity(priv_key: &Path) {
    let identity = load_identity(priv_key);
    let pem = identity.public_key().to_pem().unwrap_or_else(|e| fail(e));

    println!("Fingerprint: {}", identity.public_key().fingerprint());
    println!();
    print!("{}", pem);
}

fn cmd_introduce(priv_key: &Path, from: &str, to: &str) {
    if from.is_empty() {
        fail("--from must not be empty");
    }

    let identity = load_identity(priv_key);
    let envelope = protocol::introduce(&identity, from, to).unwrap_or_else(|e| fail(e));
    let bytes = envelope.encode().unwrap_or_else(|e| fail(e));

    println!("{}", String::from_utf8_lossy(&bytes));
}

fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut bytes = Vec::new();
        io::stdin().read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        fs::read(path)
    }
}

fn cmd_verify(path: &Path) {
    let bytes = read_input(path).unwrap_or_else(|e| fail(format!("Reading {:?}: {}", path, e)));

    let envelope = Envelope::decode(&bytes).unwrap_or_else(|e| fail(e));
    let content_type = protocol::validate(&envelope).unwrap_or_else(|e| fail(e));

    println!("Protocol:     {}", envelope.protocol);
    println!("Content type: {}", content_type);

    if envelope.introduction().is_none() {
        println!("Nothing to verify for this content type.");
        return;
    }

    match protocol::verify_introduction(&envelope) {
        Ok(verified) => {
            println!();
            println!("Introduction verified");
            println!("  From:        {}", verified.address);
            println!("  Fingerprint: {}", verified.public_key.fingerprint());
        }
        Err(e) => {
            println!();
            println!("Introduction REJECTED: {}", e);
            std::process::exit(1);
        }
    }
}
