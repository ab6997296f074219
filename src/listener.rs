//! The accept loop and the per-connection byte pump.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{Semaphore, broadcast},
};

use crate::{
    internal,
    server::{Shared, Signal},
    smtp::{
        envelope::Peer,
        session::{Action, Session},
    },
};

pub struct Listener {
    socket: TcpListener,
}

impl Listener {
    pub(crate) fn new(socket: TcpListener) -> Self {
        Self { socket }
    }

    pub(crate) fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept connections until a shutdown signal arrives, then let the
    /// in-flight sessions finish.
    pub(crate) async fn serve(
        &self,
        shared: Arc<Shared>,
        shutdown: broadcast::Sender<Signal>,
    ) -> anyhow::Result<()> {
        internal!("Listener::serve on {:?}", self.socket.local_addr());

        let mut receiver = shutdown.subscribe();
        let mut sessions = Vec::new();

        loop {
            tokio::select! {
                sig = receiver.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown)) {
                        internal!(level = INFO, "Listener received Shutdown signal, finishing sessions ...");
                        break;
                    }
                }

                connection = self.socket.accept() => {
                    let (stream, address) = connection?;
                    tracing::debug!("Connection received from {address}");
                    let shared = Arc::clone(&shared);
                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = handle_connection(stream, address, &shared).await {
                            internal!(level = ERROR, "Error: {err}");
                        }
                    }));
                }
            }
        }

        futures_util::future::join_all(sessions).await;
        Ok(())
    }
}

/// Drive one connection: pump bytes into the session, write its replies
/// back out, tear down silently when the client goes away.
async fn handle_connection(
    mut stream: TcpStream,
    address: SocketAddr,
    shared: &Shared,
) -> anyhow::Result<()> {
    // The permit is the worker-pool bound: with n permits at most n
    // connections are serviced at once, the rest wait their turn here.
    let _permit = worker_permit(&shared.workers).await?;

    let peer = Peer::new(address.ip().to_string(), address.port());
    let mut session = Session::new(
        peer,
        shared.config.clone(),
        (shared.policy_factory)(),
        shared.authenticator_factory.as_ref().map(|factory| factory()),
        Arc::clone(&shared.deliverer),
    )?;

    let mut connection = Connection::new(&mut stream);
    session.new_connection();
    if connection.flush(&mut session).await == Flow::Close {
        return Ok(());
    }

    let mut buffer = [0; 4096];
    loop {
        match connection.stream.read(&mut buffer).await {
            // EOF or a read error both mean the client is gone; nothing is
            // owed to anyone, the session just ends.
            Err(err) => {
                internal!("client disconnected: {err}");
                break;
            }
            Ok(0) => {
                internal!("client disconnected");
                break;
            }
            Ok(bytes_read) => {
                session.process_new_data(&buffer[..bytes_read]);
                if connection.flush(&mut session).await == Flow::Close {
                    break;
                }
            }
        }
    }

    Ok(())
}

async fn worker_permit(
    workers: &Arc<Semaphore>,
) -> anyhow::Result<tokio::sync::OwnedSemaphorePermit> {
    Ok(Arc::clone(workers).acquire_owned().await?)
}

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

struct Connection<'stream> {
    stream: &'stream mut TcpStream,
    ignore_writes: bool,
}

impl<'stream> Connection<'stream> {
    fn new(stream: &'stream mut TcpStream) -> Self {
        Self {
            stream,
            ignore_writes: false,
        }
    }

    /// Write the session's queued replies. After the first write error all
    /// further writes are ignored; the next read will observe the broken
    /// connection and end the session.
    async fn flush(&mut self, session: &mut Session) -> Flow {
        for action in session.drain_actions() {
            match action {
                Action::Send(reply) => {
                    if self.ignore_writes {
                        continue;
                    }
                    if let Err(err) = self.stream.write_all(reply.render().as_bytes()).await {
                        internal!("write failed, suppressing further output: {err}");
                        self.ignore_writes = true;
                    }
                }
                Action::Close => {
                    let _ = self.stream.shutdown().await;
                    return Flow::Close;
                }
            }
        }
        Flow::Continue
    }
}
