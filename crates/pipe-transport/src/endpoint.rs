//! Platform pipe endpoints.
//!
//! Both platforms expose the same crate-internal surface:
//! `PipeListener::bind`, `PipeListener::accept`, `connect` and
//! `is_retryable`.

use crate::config::TransportConfig;

/// OS-level identifier for `channel`.
///
/// A Windows pipe name, or the socket path on Unix.
pub fn pipe_name(channel: &str, config: &TransportConfig) -> String {
    imp::pipe_name(channel, config)
}

pub(crate) use imp::{connect, is_retryable, ClientStream, PipeListener, ServerStream};

#[cfg(unix)]
mod imp {
    use std::io;
    use std::os::unix::fs::MetadataExt;
    use std::path::{Path, PathBuf};

    use tokio::net::{UnixListener, UnixStream};
    use tracing::{debug, warn};

    use crate::config::TransportConfig;

    pub(crate) type ServerStream = UnixStream;
    pub(crate) type ClientStream = UnixStream;

    pub(super) fn pipe_name(channel: &str, config: &TransportConfig) -> String {
        socket_path(channel, config).to_string_lossy().into_owned()
    }

    fn socket_path(channel: &str, config: &TransportConfig) -> PathBuf {
        config.pipe_dir.join(format!("{channel}.sock"))
    }

    /// `(dev, ino)` of the file currently at `path`.
    fn file_identity(path: &Path) -> io::Result<(u64, u64)> {
        let meta = std::fs::metadata(path)?;
        Ok((meta.dev(), meta.ino()))
    }

    /// Remove a socket file left behind by a dead server.
    ///
    /// Fails with `AddrInUse` if a server still accepts on it.
    fn remove_stale_socket(path: &Path) -> io::Result<()> {
        match std::os::unix::net::UnixStream::connect(path) {
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("{} is served by another live server", path.display()),
            )),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                warn!(path = %path.display(), "Removing stale pipe socket");
                std::fs::remove_file(path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Bound Unix domain socket.
    ///
    /// The socket file is removed on drop, but only while it is still the
    /// file this listener created.
    pub(crate) struct PipeListener {
        listener: UnixListener,
        path: PathBuf,
        identity: (u64, u64),
    }

    impl PipeListener {
        pub(crate) fn bind(channel: &str, config: &TransportConfig) -> io::Result<Self> {
            std::fs::create_dir_all(&config.pipe_dir)?;
            let path = socket_path(channel, config);
            if path.exists() {
                remove_stale_socket(&path)?;
            }
            let listener = UnixListener::bind(&path)?;
            let identity = file_identity(&path)?;
            debug!(path = %path.display(), "Pipe socket bound");
            Ok(Self {
                listener,
                path,
                identity,
            })
        }

        pub(crate) async fn accept(&mut self) -> io::Result<ServerStream> {
            let (stream, _) = self.listener.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for PipeListener {
        fn drop(&mut self) {
            match file_identity(&self.path) {
                Ok(identity) if identity == self.identity => {
                    let _ = std::fs::remove_file(&self.path);
                }
                Ok(_) => {
                    debug!(path = %self.path.display(), "Pipe socket now owned by another server, leaving it");
                }
                Err(_) => {}
            }
        }
    }

    pub(crate) async fn connect(
        channel: &str,
        config: &TransportConfig,
    ) -> io::Result<ClientStream> {
        UnixStream::connect(socket_path(channel, config)).await
    }

    /// Server not started yet, or between restarts.
    pub(crate) fn is_retryable(err: &io::Error) -> bool {
        matches!(
            err.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
        )
    }
}

#[cfg(windows)]
mod imp {
    use std::io;

    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    use crate::config::TransportConfig;

    pub(crate) type ServerStream = NamedPipeServer;
    pub(crate) type ClientStream = NamedPipeClient;

    const ERROR_PIPE_BUSY: i32 = 231;

    pub(super) fn pipe_name(channel: &str, _config: &TransportConfig) -> String {
        format!(r"\\.\pipe\{channel}")
    }

    /// Holds the next unconnected server instance for the channel.
    ///
    /// Several processes may serve the same channel; the OS hands each
    /// client to one of the waiting instances.
    pub(crate) struct PipeListener {
        name: String,
        next: NamedPipeServer,
    }

    fn create_instance(name: &str) -> io::Result<NamedPipeServer> {
        ServerOptions::new()
            .first_pipe_instance(false)
            .access_inbound(true)
            .access_outbound(true)
            .create(name)
    }

    impl PipeListener {
        pub(crate) fn bind(channel: &str, config: &TransportConfig) -> io::Result<Self> {
            let name = pipe_name(channel, config);
            let next = create_instance(&name)?;
            Ok(Self { name, next })
        }

        /// Wait for a client on the current instance, then put a fresh
        /// instance in place for the next iteration.
        pub(crate) async fn accept(&mut self) -> io::Result<ServerStream> {
            let connected = self.next.connect().await;
            let fresh = create_instance(&self.name)?;
            let endpoint = std::mem::replace(&mut self.next, fresh);
            connected.map(|()| endpoint)
        }
    }

    pub(crate) async fn connect(
        channel: &str,
        config: &TransportConfig,
    ) -> io::Result<ClientStream> {
        ClientOptions::new().open(pipe_name(channel, config))
    }

    /// All instances busy, or no server instance exists yet.
    pub(crate) fn is_retryable(err: &io::Error) -> bool {
        err.raw_os_error() == Some(ERROR_PIPE_BUSY) || err.kind() == io::ErrorKind::NotFound
    }
}
