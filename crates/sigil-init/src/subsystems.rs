use std::io;

use crate::rendezvous::RendezvousConfig;
use crate::std_handles::PipeResolver;
use crate::{charset, sockets};

/// The platform facilities bootstrap brings up, in the order it calls them.
pub trait Subsystems {
    fn detect_native_charset(&mut self, hint: Option<&str>) -> Option<String>;

    /// Initialize the cooperative threading runtime. It starts the socket
    /// library as part of its own setup.
    fn init_threading_runtime(&mut self) -> io::Result<()>;

    fn startup_sockets(&mut self) -> io::Result<()>;

    fn pipe_resolver(&mut self) -> &mut dyn PipeResolver;
}

#[derive(Debug, Clone, Default)]
pub struct HostSubsystems {
    rendezvous: RendezvousConfig,
}

impl HostSubsystems {
    pub fn new(rendezvous: RendezvousConfig) -> Self {
        HostSubsystems { rendezvous }
    }
}

impl Subsystems for HostSubsystems {
    fn detect_native_charset(&mut self, hint: Option<&str>) -> Option<String> {
        charset::detect_native_charset(hint)
    }

    // No cooperative runtime is linked into the host build; do the part of its
    // setup bootstrap depends on.
    fn init_threading_runtime(&mut self) -> io::Result<()> {
        sockets::host_socket_startup()
    }

    fn startup_sockets(&mut self) -> io::Result<()> {
        sockets::host_socket_startup()
    }

    fn pipe_resolver(&mut self) -> &mut dyn PipeResolver {
        &mut self.rendezvous
    }
}
