use crate::session::{Session, SessionEnd};
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use tracing::{info, warn};

/// Accepts one connection at a time and runs a [`Session`] on it.
pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        // std sets SO_REUSEADDR on unix listeners
        let listener = TcpListener::bind(addr)?;
        Ok(Server { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until a client sends `stop-server`. The listening socket is
    /// closed when this returns.
    pub fn serve(self) -> io::Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(conn) => conn,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            info!(%peer, "client connected");
            let mut session = Session::new(stream);
            match session.run() {
                Ok(SessionEnd::ClientExit) => info!(%peer, "client exited"),
                Ok(SessionEnd::StopServer) => {
                    info!(%peer, "stop requested, shutting down");
                    break;
                }
                Err(e) => warn!(%peer, error = %e, "session ended"),
            }
        }
        Ok(())
    }
}
