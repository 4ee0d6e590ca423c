//! A client connected to an in-process server over an in-memory pipe.
//!
//! This lets a store be used through its gRPC interface without binding a socket, which is how the
//! command-line client and the integration tests talk to a store.

use crate::backend::BlogBackend;
use crate::client::blog::BlogClient;
use crate::handler::BlogHandler;
use crate::server::blog::BlogServer;
use crate::{BlogError, Location};
use hyper_util::rt::TokioIo;
use std::io;
use std::ops::{Deref, DerefMut};
use tonic::transport::{Channel, Endpoint, Server};

/// The capacity of the in-memory pipe between the client and the server, in bytes.
const DUPLEX_SIZE: usize = 1024;

/// The error returned when a transitive client cannot be set up.
#[derive(Debug, thiserror::Error)]
pub enum TransitiveError {
    /// The store could not be opened.
    #[error("cannot open the blog store")]
    Store(#[from] BlogError),
    /// The client could not connect to the in-process server.
    #[error("cannot connect to the in-process server")]
    Transport(#[from] tonic::transport::Error),
}

/// A client whose server runs on a background task of the current runtime.
///
/// The server stops once the client, and every clone of its channel, is dropped.
#[derive(Debug)]
pub struct Transitive<T> {
    client: T,
}

impl<T> Transitive<T> {
    /// Take the client out of the wrapper.
    pub fn into_inner(self) -> T {
        self.client
    }
}

impl<T> Deref for Transitive<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl<T> DerefMut for Transitive<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

/// Open the store at `location` and return a client connected to a server for it.
///
/// # Errors
///
/// [`TransitiveError::Store`] if the store cannot be opened, [`TransitiveError::Transport`] if the
/// client cannot connect.
pub async fn blog_client<L, Backend>(
    location: L,
) -> Result<Transitive<BlogClient<Channel>>, TransitiveError>
where
    L: Into<Location> + Send,
    Backend: BlogBackend + 'static,
{
    let handler = BlogHandler::<Backend>::at_location(location.into())?;
    serve_handler(handler).await
}

/// Return a client connected to a server for an existing handler.
///
/// # Errors
///
/// [`TransitiveError::Transport`] if the client cannot connect.
pub async fn serve_handler<Backend>(
    handler: BlogHandler<Backend>,
) -> Result<Transitive<BlogClient<Channel>>, TransitiveError>
where
    Backend: BlogBackend + 'static,
{
    let (client, server) = tokio::io::duplex(DUPLEX_SIZE);

    let _join_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(BlogServer::new(handler))
            .serve_with_incoming(tokio_stream::once(Ok::<_, io::Error>(server)))
            .await
    });

    let mut client = Some(client);
    let channel = Endpoint::try_from("http://[::]:50051")?
        .connect_with_connector(tower::service_fn(move |_| {
            let client = client.take();
            async move {
                client
                    .map(TokioIo::new)
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "client already taken"))
            }
        }))
        .await?;

    Ok(Transitive {
        client: BlogClient::new(channel),
    })
}
