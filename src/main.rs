//! A command-line interface for serving and querying blog posts with the buffblog library.
//!
//! For usage, run `cargo run -- --help`.

mod cli;

use crate::cli::{Args, Backend, BlogArgs, BlogCommand, Command, RunArgs};
#[cfg(feature = "duckdb")]
use buffblog::backend::DuckDb;
#[cfg(feature = "rocksdb")]
use buffblog::backend::RocksDb;
#[cfg(feature = "sqlite")]
use buffblog::backend::Sqlite;
use buffblog::backend::BlogBackend;
use buffblog::client::blog::BlogClient;
use buffblog::handler::BlogHandler;
use buffblog::proto::blog::{
    Blog, CreateBlogRequest, DeleteBlogRequest, DeleteBlogResponse, ListBlogRequest,
    ReadBlogRequest, UpdateBlogRequest,
};
use buffblog::server::blog::BlogServer;
use buffblog::{reflection, transitive, Location};
use clap::Parser as _;
use std::process::ExitCode;
use tonic::transport::Server;

#[cfg(feature = "tracing")]
use tracing::{info, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($x:tt)*) => {};
}
#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($x:tt)*) => {};
}

/// A custom error message.
#[derive(Debug)]
struct ErrStr(&'static str);

impl std::error::Error for ErrStr {}

impl std::fmt::Display for ErrStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Args { backend, command } = Args::parse();

    #[cfg(feature = "tracing")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let future = async {
        match backend {
            #[cfg(feature = "duckdb")]
            Backend::DuckDb => match command {
                Command::Run(args) => run::<DuckDb>(args).await,
                Command::Blog(args) => blog::<DuckDb>(args).await,
            },
            #[cfg(feature = "sqlite")]
            Backend::Sqlite => match command {
                Command::Run(args) => run::<Sqlite>(args).await,
                Command::Blog(args) => blog::<Sqlite>(args).await,
            },
            #[cfg(feature = "rocksdb")]
            Backend::RocksDb => match command {
                Command::Run(args) => run::<RocksDb>(args).await,
                Command::Blog(args) => blog::<RocksDb>(args).await,
            },
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(future)
}

/// Serve the blog service until Ctrl-C is received.
///
/// The store is opened before the listener is bound, so a store that cannot be opened prevents
/// the server from starting. Once the listener stops, the store is closed.
async fn run<Backend>(
    RunArgs {
        store,
        in_memory,
        addr,
    }: RunArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>>
where
    Backend: BlogBackend + 'static,
{
    let location = if in_memory {
        Location::InMemory
    } else {
        Location::from(store)
    };
    let handler = BlogHandler::<Backend>::at_location(location.clone())?;
    info!(%location, "blog store opened");

    info!(%addr, "blog server listening");
    Server::builder()
        .add_service(BlogServer::new(handler))
        .add_service(reflection::service()?)
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;
    info!("blog server stopped");
    info!(%location, "blog store closed");

    Ok(ExitCode::SUCCESS)
}

/// Resolve once Ctrl-C is received. If the signal handler cannot be installed, the server keeps
/// running until the process is killed.
#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("stopping the blog server");
}

/// Perform operations on blog posts.
///
/// # stdout
///
/// Creating a post writes its id. Reading, updating, and listing write one line per post: the id,
/// author, title, and content, separated by tabs. Deleting writes the id that was requested.
async fn blog<Backend>(
    BlogArgs {
        store,
        connect,
        command,
    }: BlogArgs,
) -> Result<ExitCode, Box<dyn std::error::Error>>
where
    Backend: BlogBackend + 'static,
{
    let mut client = match connect {
        Some(uri) => BlogClient::connect(uri).await?,
        None => transitive::blog_client::<_, Backend>(store)
            .await?
            .into_inner(),
    };

    match command {
        BlogCommand::Create {
            author_id,
            title,
            content,
        } => {
            let blog = client
                .create_blog(CreateBlogRequest {
                    blog: Some(Blog {
                        id: String::new(),
                        author_id,
                        title,
                        content,
                    }),
                })
                .await?
                .into_inner()
                .blog
                .ok_or(ErrStr("server returned no blog"))?;
            #[allow(clippy::print_stdout)]
            {
                println!("{}", blog.id);
            }
        }
        BlogCommand::Read { id } => {
            let blog = client
                .read_blog(ReadBlogRequest { blog_id: id })
                .await?
                .into_inner()
                .blog
                .ok_or(ErrStr("server returned no blog"))?;
            print_blog(&blog);
        }
        BlogCommand::Update {
            id,
            author_id,
            title,
            content,
        } => {
            let blog = client
                .update_blog(UpdateBlogRequest {
                    blog: Some(Blog {
                        id,
                        author_id,
                        title,
                        content,
                    }),
                })
                .await?
                .into_inner()
                .blog
                .ok_or(ErrStr("server returned no blog"))?;
            print_blog(&blog);
        }
        BlogCommand::Delete { id } => {
            let DeleteBlogResponse { blog_id } = client
                .delete_blog(DeleteBlogRequest { blog_id: id })
                .await?
                .into_inner();
            #[allow(clippy::print_stdout)]
            {
                println!("{blog_id}");
            }
        }
        BlogCommand::List => {
            let mut blogs = client.list_blog(ListBlogRequest {}).await?.into_inner();
            while let Some(response) = blogs.message().await? {
                let blog = response.blog.ok_or(ErrStr("server returned no blog"))?;
                print_blog(&blog);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Write a blog post to stdout as a single tab-separated line.
#[allow(clippy::print_stdout)]
fn print_blog(blog: &Blog) {
    let Blog {
        id,
        author_id,
        title,
        content,
    } = blog;
    println!("{id}\t{author_id}\t{title}\t{content}");
}
