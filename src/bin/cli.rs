//! memlink CLI Client
//!
//! Command-line interface for issuing binary-protocol commands to a cache server.

use clap::{Parser, Subcommand};
use memlink::{
    Config, DeleteRequest, GatRequest, GetRequest, Handler, MemlinkError, SetRequest,
    TouchRequest,
};
use tracing_subscriber::{fmt, EnvFilter};

/// memlink CLI
#[derive(Parser, Debug)]
#[command(name = "memlink-cli")]
#[command(about = "CLI for memcached binary-protocol servers")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:11211")]
    server: String,

    /// Socket read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a value unconditionally
    Set(StoreArgs),

    /// Store a value only if the key is absent
    Add(StoreArgs),

    /// Store a value only if the key is present
    Replace(StoreArgs),

    /// Append to an existing value
    Append(StoreArgs),

    /// Prepend to an existing value
    Prepend(StoreArgs),

    /// Get one or more keys
    Get {
        /// Keys to fetch, in order
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Get one or more keys with their expiration
    Gete {
        /// Keys to fetch, in order
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Get a key and set a new expiration
    Gat {
        /// The key to fetch
        key: String,

        /// New expiration
        exptime: u32,
    },

    /// Delete a key
    Delete {
        /// The key to delete
        key: String,
    },

    /// Set a new expiration on a key
    Touch {
        /// The key to touch
        key: String,

        /// New expiration
        exptime: u32,
    },
}

#[derive(clap::Args, Debug)]
struct StoreArgs {
    /// The key to store
    key: String,

    /// The value to store
    value: String,

    /// Opaque client flags
    #[arg(short, long, default_value = "0")]
    flags: u32,

    /// Expiration (seconds, or a unix timestamp)
    #[arg(short, long, default_value = "0")]
    exptime: u32,
}

impl StoreArgs {
    fn request(&self) -> SetRequest {
        SetRequest::new(self.key.as_str(), self.value.clone().into_bytes())
            .flags(self.flags)
            .exptime(self.exptime)
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .server_addr(&args.server)
        .connect_timeout_ms(args.timeout_ms)
        .read_timeout_ms(args.timeout_ms)
        .write_timeout_ms(args.timeout_ms)
        .build();

    let handler = match Handler::connect(&config) {
        Ok(h) => h,
        Err(e) => {
            tracing::error!("Failed to connect to {}: {}", args.server, e);
            std::process::exit(1);
        }
    };

    match run(handler, args.command) {
        Ok(()) => {}
        Err(MemlinkError::KeyNotFound) => {
            println!("NOT_FOUND");
            std::process::exit(2);
        }
        Err(MemlinkError::KeyExists) => {
            println!("EXISTS");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(mut handler: Handler, command: Commands) -> memlink::Result<()> {
    match command {
        Commands::Set(store) => handler.set(&store.request())?,
        Commands::Add(store) => handler.add(&store.request())?,
        Commands::Replace(store) => handler.replace(&store.request())?,
        Commands::Append(store) => handler.append(&store.request())?,
        Commands::Prepend(store) => handler.prepend(&store.request())?,
        Commands::Get { keys } => {
            let mut batch = handler.get(GetRequest::from_keys(keys));
            let mut failure = None;
            for item in batch.by_ref() {
                match item {
                    Ok(resp) if resp.miss => {
                        println!("{}: MISS", String::from_utf8_lossy(&resp.key))
                    }
                    Ok(resp) => println!(
                        "{} (flags={}): {}",
                        String::from_utf8_lossy(&resp.key),
                        resp.flags,
                        String::from_utf8_lossy(resp.data.as_deref().unwrap_or_default())
                    ),
                    Err(e) => failure = Some(e),
                }
            }
            handler = batch.finish()?;
            if let Some(e) = failure {
                return Err(e);
            }
        }
        Commands::Gete { keys } => {
            let mut batch = handler.get_e(GetRequest::from_keys(keys));
            let mut failure = None;
            for item in batch.by_ref() {
                match item {
                    Ok(resp) if resp.miss => {
                        println!("{}: MISS", String::from_utf8_lossy(&resp.key))
                    }
                    Ok(resp) => println!(
                        "{} (flags={}, exptime={}): {}",
                        String::from_utf8_lossy(&resp.key),
                        resp.flags,
                        resp.exptime,
                        String::from_utf8_lossy(resp.data.as_deref().unwrap_or_default())
                    ),
                    Err(e) => failure = Some(e),
                }
            }
            handler = batch.finish()?;
            if let Some(e) = failure {
                return Err(e);
            }
        }
        Commands::Gat { key, exptime } => {
            let resp = handler.gat(&GatRequest {
                key: key.into_bytes(),
                exptime,
                opaque: 0,
            })?;
            if resp.miss {
                println!("MISS");
            } else {
                println!(
                    "(flags={}): {}",
                    resp.flags,
                    String::from_utf8_lossy(resp.data.as_deref().unwrap_or_default())
                );
            }
        }
        Commands::Delete { key } => handler.delete(&DeleteRequest {
            key: key.into_bytes(),
        })?,
        Commands::Touch { key, exptime } => handler.touch(&TouchRequest {
            key: key.into_bytes(),
            exptime,
        })?,
    }

    println!("OK");
    handler.close()
}
