use std::io;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SocketStatus {
    NotRequired,
    /// The cooperative threading runtime starts the socket library itself.
    DeferredToThreadingRuntime,
    Started,
    /// Startup failed; socket calls will report it when they are made.
    Failed,
}

/// Start the host socket library.
///
/// std starts Winsock lazily on the first socket it creates, so creating and
/// dropping one forces that to happen now. Elsewhere there is nothing to do.
pub fn host_socket_startup() -> io::Result<()> {
    if cfg!(windows) {
        std::net::UdpSocket::bind((std::net::Ipv4Addr::LOCALHOST, 0)).map(drop)
    } else {
        Ok(())
    }
}
