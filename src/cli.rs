//! Command-line interface for buffblog.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tonic::transport::Uri;

/// The storage engine to keep blog posts in.
///
/// Note that the backend must be enabled at compile time for it to be used.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Backend {
    #[cfg(feature = "duckdb")]
    #[clap(name = "duckdb")]
    #[allow(clippy::missing_docs_in_private_items)]
    DuckDb,
    #[cfg(feature = "sqlite")]
    #[allow(clippy::missing_docs_in_private_items)]
    Sqlite,
    #[cfg(feature = "rocksdb")]
    #[clap(name = "rocksdb")]
    #[allow(clippy::missing_docs_in_private_items)]
    RocksDb,
}

impl Default for Backend {
    #[allow(unreachable_code)] // simpler than more complex cfgs
    fn default() -> Self {
        #[cfg(feature = "sqlite")]
        return Self::Sqlite;
        #[cfg(feature = "duckdb")]
        return Self::DuckDb;
        #[cfg(feature = "rocksdb")]
        return Self::RocksDb;

        unreachable!()
    }
}

/// Command-line arguments for buffblog.
#[derive(Debug, Parser)]
pub(crate) struct Args {
    /// The storage engine holding the blog posts.
    #[arg(value_enum, short, long, global = true, default_value_t = Backend::default())]
    pub(crate) backend: Backend,
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// What operation to perform.
#[derive(Debug, Subcommand)]
#[command(version, propagate_version = true)]
pub(crate) enum Command {
    /// Run the blog service as a gRPC server.
    ///
    /// The server listens on the given address until it receives Ctrl-C, then stops accepting
    /// requests and closes the store.
    #[clap(alias = "serve")]
    Run(RunArgs),
    /// Perform operations on blog posts.
    #[clap(alias = "post")]
    Blog(BlogArgs),
}

/// Run the blog service as a gRPC server.
#[derive(Debug, Parser)]
#[command(propagate_version = true)]
pub(crate) struct RunArgs {
    /// The location of the blog store.
    #[clap(long, default_value = "blog_store.db", conflicts_with = "in_memory")]
    pub(crate) store: PathBuf,
    /// Keep the blog store in memory. Everything is lost when the server stops.
    #[clap(long)]
    pub(crate) in_memory: bool,
    /// The address to listen on.
    #[clap(default_value = "[::1]:50051")]
    pub(crate) addr: SocketAddr,
}

/// Arguments for performing operations on blog posts.
#[derive(Debug, Parser)]
#[command(propagate_version = true)]
pub(crate) struct BlogArgs {
    /// The location of the blog store. Ignored when connecting to a running server.
    #[arg(short, long, default_value = "blog_store.db")]
    pub(crate) store: PathBuf,
    /// The address of a running server to send requests to, such as `http://[::1]:50051`.
    ///
    /// If omitted, requests are served in-process from the store given by `--store`.
    #[arg(short, long)]
    pub(crate) connect: Option<Uri>,
    /// The operation to perform.
    #[command(subcommand)]
    pub(crate) command: BlogCommand,
}

/// Perform an operation on blog posts.
#[derive(Debug, Subcommand)]
pub(crate) enum BlogCommand {
    /// Create a blog post. Its id is written to stdout.
    #[clap(aliases = ["new", "add"])]
    Create {
        /// The id of the author.
        author_id: String,
        /// The title of the post.
        title: String,
        /// The content of the post.
        content: String,
    },
    /// Read a blog post. Its fields are written to stdout.
    #[clap(aliases = ["get", "fetch"])]
    Read {
        /// The id of the post.
        id: String,
    },
    /// Replace the author, title, and content of a blog post.
    #[clap(alias = "set")]
    Update {
        /// The id of the post.
        id: String,
        /// The new id of the author.
        author_id: String,
        /// The new title of the post.
        title: String,
        /// The new content of the post.
        content: String,
    },
    /// Delete a blog post.
    #[clap(aliases = ["remove", "rm"])]
    Delete {
        /// The id of the post.
        id: String,
    },
    /// List every blog post, one per line.
    #[clap(alias = "ls")]
    List,
}
