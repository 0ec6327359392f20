use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "crystal",
    version,
    about = "Talks to a crystal shard tree",
    long_about = None
)]
pub struct Cli {
    #[arg(short, long)]
    pub addr: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run in interactive REPL mode
    Interactive,

    /// Read a key from a shard
    Get {
        address: String,
        key: String,
    },

    /// Write a register value on a shard
    Put {
        address: String,
        key: String,
        value: String,
    },

    /// Increment a counter on a shard
    Incr {
        address: String,
        key: String,
    },

    /// Merge a JSON state into a shard
    Merge {
        address: String,
        json: String,
    },

    /// Print the local state of a shard
    Dump {
        address: String,
    },

    /// Write through a leaf picked from the shard layout
    Write {
        base: String,
        key: String,
        value: Option<String>,

        /// token that picks the leaf, random when omitted
        #[arg(long)]
        spread: Option<String>,

        #[arg(long, default_value_t = 100)]
        shard_count: u64,

        #[arg(long, default_value_t = 5)]
        shard_ratio: u64,
    },
}
