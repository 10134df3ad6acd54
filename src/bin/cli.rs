//! StrataKV CLI Client
//!
//! Command-line interface for interacting with a StrataKV node.

use clap::{Parser, Subcommand};
use stratakv::Client;

/// StrataKV CLI
#[derive(Parser, Debug)]
#[command(name = "stratakv-cli")]
#[command(about = "CLI for the StrataKV key-value node")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11212")]
    server: String,

    /// Read timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Delete every key
    Flush,

    /// Print server statistics
    Stats,

    /// Print the server version
    Version,

    /// Ping the server
    Ping,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> stratakv::Result<()> {
    let mut client = Client::connect(&args.server)?;
    client.set_timeout(args.timeout_ms)?;

    match args.command {
        Commands::Get { key } => match client.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            client.set(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            if client.delete(key.as_bytes())? {
                println!("OK");
            } else {
                println!("(not found)");
            }
        }
        Commands::Flush => {
            client.flush()?;
            println!("OK");
        }
        Commands::Stats => {
            for (name, value) in client.stats()? {
                println!("{} {}", name, value);
            }
        }
        Commands::Version => println!("{}", client.version()?),
        Commands::Ping => {
            client.noop()?;
            println!("PONG");
        }
    }

    client.quit()
}
