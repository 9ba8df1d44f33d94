//! Remote front end for the `dsh` pipeline engine: a TCP server that runs
//! command lines on behalf of a client and streams the output back.

pub mod client;
pub mod config;
pub mod frame;
pub mod server;
pub mod session;

pub use client::Client;
pub use server::Server;
pub use session::{Session, SessionEnd, SessionError};
