//! offstore CLI
//!
//! Inspect and edit attribute columns in a store file.

use clap::{Parser, Subcommand};
use offstore::{Attribute, AttributeId, Config, ObjectStoreRoot, OffError, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// offstore CLI
#[derive(Parser, Debug)]
#[command(name = "offstore")]
#[command(about = "Inspect and edit an offstore attribute store")]
#[command(version)]
struct Args {
    /// Store URI (file:<path>, a bare path, or memory:)
    #[arg(short, long, default_value = "file:./offstore.db")]
    uri: String,

    /// Create the store if it does not exist
    #[arg(short, long)]
    create: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show store status, attributes and metadata
    Info,

    /// Get the value of an object
    Get {
        /// Attribute id
        #[arg(short, long)]
        attr: u32,

        /// Object id
        id: u64,
    },

    /// Set the value of an object
    Set {
        /// Attribute id
        #[arg(short, long)]
        attr: u32,

        /// Maintain the reverse index eagerly if the attribute is new
        #[arg(short, long)]
        reversed: bool,

        /// Object id
        id: u64,

        /// Value literal (int:N, float:X, bytes:TEXT, or inferred)
        #[arg(value_parser = parse_value)]
        value: Value,
    },

    /// Delete an object from an attribute
    Del {
        /// Attribute id
        #[arg(short, long)]
        attr: u32,

        /// Object id
        id: u64,
    },

    /// List object ids holding a value
    Find {
        /// Attribute id
        #[arg(short, long)]
        attr: u32,

        /// Value literal
        #[arg(value_parser = parse_value)]
        value: Value,
    },

    /// Build and persist the reverse index of an attribute
    Reverse {
        /// Attribute id
        #[arg(short, long)]
        attr: u32,
    },

    /// Rewrite the store file without superseded records
    Compact,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,offstore=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .uri(&args.uri)
        .create_if_missing(args.create)
        .build();

    let root = match ObjectStoreRoot::open_with(config) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = run(&root, args.command).and_then(|()| root.close());
    if let Err(e) = outcome {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_value(s: &str) -> Result<Value, String> {
    s.parse()
}

/// Handle for an attribute the store already knows; never registers one
fn existing(root: &ObjectStoreRoot, attr: AttributeId) -> offstore::Result<Attribute> {
    root.existing_attribute(attr)?.ok_or(OffError::UnknownAttribute(attr))
}

fn run(root: &ObjectStoreRoot, command: Commands) -> offstore::Result<()> {
    match command {
        Commands::Info => {
            println!("uri:    {}", root.uri());
            println!("status: {:?}", root.status());
            for id in root.attribute_ids()? {
                let attr = existing(root, id)?;
                println!("attribute {}: {:?}, {} entries", id, attr.mode()?, attr.len()?);
            }
            for key in root.metadata_keys()? {
                if let Some(value) = root.metadata(&key)? {
                    println!("meta {} = {}", key, value);
                }
            }
        }
        Commands::Get { attr, id } => {
            println!("{}", existing(root, attr)?.get(id)?);
        }
        Commands::Set {
            attr,
            reversed,
            id,
            value,
        } => {
            root.attribute(attr, reversed)?.set(id, value)?;
        }
        Commands::Del { attr, id } => {
            let old = existing(root, attr)?.delete(id)?;
            println!("deleted {} (was {})", id, old);
        }
        Commands::Find { attr, value } => {
            let ids = existing(root, attr)?.find(&value)?;
            let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            println!("[{}]", ids.join(", "));
        }
        Commands::Reverse { attr } => {
            existing(root, attr)?.set_reverse()?;
        }
        Commands::Compact => {
            root.compact()?;
        }
    }
    Ok(())
}
