//! SFTP session over SSH
//!
//! Wraps a russh client handle and hands out one SFTP subsystem channel per
//! worker. The walker runs on plain OS threads, so every async call is driven
//! to completion on a small dedicated tokio runtime owned by the session.

use crate::error::{ConfigError, RemoteError, RemoteResult};
use crate::remote::auth::{AuthMethod, Credentials};
use crate::remote::types::{join_remote_path, DirectoryEntry, EntryType};
use crate::remote::{RemoteChannel, RemoteSession};
use parking_lot::Mutex;
use russh::client::{self, Handle};
use russh::keys::{self, PrivateKeyWithHashAlg};
use russh::Disconnect;
use russh_sftp::client::error::Error as SftpClientError;
use russh_sftp::client::SftpSession as RusshSftp;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default connection timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Transfer buffer size
const TRANSFER_CHUNK: usize = 64 * 1024;

/// Host and port of an SSH server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpTarget {
    /// Hostname or IP address
    pub host: String,

    /// TCP port
    pub port: u16,
}

impl SftpTarget {
    /// Create a target from parts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a target string
    ///
    /// Accepts formats:
    /// - host
    /// - host:port
    /// - sftp://host[:port] or ssh://host[:port]
    /// - [v6addr]:port
    pub fn parse(target: &str) -> Result<Self, ConfigError> {
        let raw = target.trim();
        let rest = raw
            .strip_prefix("sftp://")
            .or_else(|| raw.strip_prefix("ssh://"))
            .unwrap_or(raw)
            .trim_end_matches('/');

        if rest.is_empty() {
            return Err(ConfigError::InvalidTarget(format!(
                "'{}': missing host",
                target
            )));
        }

        // Bracketed IPv6
        if let Some(inner) = rest.strip_prefix('[') {
            let (host, after) = inner.split_once(']').ok_or_else(|| {
                ConfigError::InvalidTarget(format!("'{}': unterminated '['", target))
            })?;
            let port = match after.strip_prefix(':') {
                Some(p) => parse_port(target, p)?,
                None if after.is_empty() => DEFAULT_PORT,
                None => {
                    return Err(ConfigError::InvalidTarget(format!(
                        "'{}': unexpected '{}'",
                        target, after
                    )))
                }
            };
            return Ok(Self::new(host, port));
        }

        match rest.split_once(':') {
            Some((host, port)) if !port.contains(':') => {
                if host.is_empty() {
                    return Err(ConfigError::InvalidTarget(format!(
                        "'{}': missing host",
                        target
                    )));
                }
                Ok(Self::new(host, parse_port(target, port)?))
            }
            // Bare IPv6 address without port
            Some(_) => Ok(Self::new(rest, DEFAULT_PORT)),
            None => Ok(Self::new(rest, DEFAULT_PORT)),
        }
    }
}

fn parse_port(target: &str, port: &str) -> Result<u16, ConfigError> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| ConfigError::InvalidTarget(format!("'{}': invalid port '{}'", target, port)))
}

impl fmt::Display for SftpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "sftp://[{}]:{}", self.host, self.port)
        } else {
            write!(f, "sftp://{}:{}", self.host, self.port)
        }
    }
}

/// Host keys are accepted without verification
struct AcceptingHandler;

impl client::Handler for AcceptingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            fingerprint = %server_public_key.fingerprint(keys::ssh_key::HashAlg::Sha256),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// Builder for SFTP sessions with retry support
pub struct SftpSessionBuilder {
    target: SftpTarget,
    credentials: Credentials,
    timeout: Duration,
    retries: u32,
}

impl SftpSessionBuilder {
    /// Create a new builder
    pub fn new(target: SftpTarget, credentials: Credentials) -> Self {
        Self {
            target,
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retries: 3,
        }
    }

    /// Set connection timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retry count for transient connection failures
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Connect and authenticate, retrying transient failures
    pub fn connect(self) -> RemoteResult<SftpSession> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sftp-io")
            .enable_all()
            .build()
            .map_err(|e| RemoteError::ConnectionFailed {
                host: self.target.host.clone(),
                reason: format!("failed to start I/O runtime: {}", e),
            })?;

        let mut last_error = None;

        for attempt in 0..=self.retries {
            if attempt > 0 {
                // Exponential backoff: 100ms, 200ms, 400ms, ...
                let delay = Duration::from_millis(100 * (1 << (attempt - 1).min(10)));
                std::thread::sleep(delay);
            }

            match runtime.block_on(self.connect_once()) {
                Ok(handle) => {
                    info!(
                        target_host = %self.target,
                        user = %self.credentials.username,
                        method = %self.credentials.method,
                        "SSH session established"
                    );
                    return Ok(SftpSession {
                        runtime,
                        handle: Mutex::new(handle),
                        target: self.target,
                    });
                }
                Err(e) if e.is_transient() => {
                    warn!(attempt = attempt + 1, error = %e, "Connection attempt failed");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| RemoteError::ConnectionFailed {
            host: self.target.host.clone(),
            reason: "no connection attempts made".into(),
        }))
    }

    async fn connect_once(&self) -> RemoteResult<Handle<AcceptingHandler>> {
        let config = Arc::new(client::Config::default());
        let addr = (self.target.host.as_str(), self.target.port);

        let mut handle =
            match tokio::time::timeout(self.timeout, client::connect(config, addr, AcceptingHandler))
                .await
            {
                Err(_) => {
                    return Err(RemoteError::Timeout {
                        host: self.target.host.clone(),
                        secs: self.timeout.as_secs(),
                    })
                }
                Ok(Err(e)) => {
                    return Err(RemoteError::ConnectionFailed {
                        host: self.target.host.clone(),
                        reason: e.to_string(),
                    })
                }
                Ok(Ok(handle)) => handle,
            };

        self.authenticate(&mut handle).await?;
        Ok(handle)
    }

    async fn authenticate(&self, handle: &mut Handle<AcceptingHandler>) -> RemoteResult<()> {
        let user = self.credentials.username.clone();
        let failed = |e: russh::Error| RemoteError::ConnectionFailed {
            host: self.target.host.clone(),
            reason: e.to_string(),
        };

        let result = match self.credentials.method {
            AuthMethod::Password => {
                let password = self.credentials.password.clone().unwrap_or_default();
                handle
                    .authenticate_password(user, password)
                    .await
                    .map_err(failed)?
            }
            AuthMethod::Key | AuthMethod::KeyWithPassword => {
                let key = self.credentials.decode_key()?;
                let hash_alg = handle
                    .best_supported_rsa_hash()
                    .await
                    .map_err(failed)?
                    .flatten();
                handle
                    .authenticate_publickey(
                        user,
                        PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                    )
                    .await
                    .map_err(failed)?
            }
        };

        if result.success() {
            Ok(())
        } else {
            Err(RemoteError::Authentication {
                host: self.target.host.clone(),
                user: self.credentials.username.clone(),
            })
        }
    }
}

/// An authenticated SSH session that opens SFTP channels
pub struct SftpSession {
    handle: Mutex<Handle<AcceptingHandler>>,
    target: SftpTarget,
    runtime: Runtime,
}

impl SftpSession {
    /// Target this session is connected to
    pub fn target(&self) -> &SftpTarget {
        &self.target
    }

    /// Disconnect the SSH session
    pub fn close(self) {
        let handle = self.handle.into_inner();
        if let Err(e) = self
            .runtime
            .block_on(handle.disconnect(Disconnect::ByApplication, "", "en"))
        {
            debug!(error = %e, "Disconnect failed");
        }
    }
}

impl RemoteSession for SftpSession {
    type Channel = SftpChannel;

    fn open_channel(&self) -> RemoteResult<SftpChannel> {
        let handle = self.handle.lock();
        let sftp = self.runtime.block_on(async {
            let channel = handle
                .channel_open_session()
                .await
                .map_err(|e| RemoteError::ChannelFailed(e.to_string()))?;
            channel
                .request_subsystem(true, "sftp")
                .await
                .map_err(|e| RemoteError::ChannelFailed(e.to_string()))?;
            RusshSftp::new(channel.into_stream())
                .await
                .map_err(|e| RemoteError::ChannelFailed(e.to_string()))
        })?;

        debug!(target_host = %self.target, "SFTP channel opened");

        Ok(SftpChannel {
            sftp,
            runtime: self.runtime.handle().clone(),
        })
    }
}

/// One SFTP subsystem channel, owned by a single worker
pub struct SftpChannel {
    sftp: RusshSftp,
    runtime: tokio::runtime::Handle,
}

impl RemoteChannel for SftpChannel {
    fn list(&mut self, path: &str) -> RemoteResult<Vec<DirectoryEntry>> {
        let dir = if path.is_empty() { "." } else { path };
        let read_dir = self
            .runtime
            .block_on(self.sftp.read_dir(dir))
            .map_err(|e| map_sftp_error(e, dir))?;

        Ok(read_dir
            .filter_map(|entry| {
                let name = entry.file_name();
                if name == "." || name == ".." {
                    return None;
                }
                let parsed = entry_from_attributes(path, &name, &entry.metadata());
                if parsed.is_none() {
                    debug!(parent = %path, name = %name, "Skipping entry without mode");
                }
                parsed
            })
            .collect())
    }

    fn get(&mut self, remote_path: &str, sink: &mut dyn Write) -> RemoteResult<u64> {
        let sftp = &self.sftp;
        self.runtime.block_on(async {
            let mut file = sftp
                .open(remote_path)
                .await
                .map_err(|e| map_sftp_error(e, remote_path))?;

            let mut buf = vec![0u8; TRANSFER_CHUNK];
            let mut total = 0u64;
            loop {
                let n = file
                    .read(&mut buf)
                    .await
                    .map_err(|e| map_io_error(e, remote_path))?;
                if n == 0 {
                    break;
                }
                sink.write_all(&buf[..n]).map_err(|e| RemoteError::Io {
                    path: remote_path.to_string(),
                    reason: format!("local write failed: {}", e),
                })?;
                total += n as u64;
            }
            sink.flush().map_err(|e| RemoteError::Io {
                path: remote_path.to_string(),
                reason: format!("local flush failed: {}", e),
            })?;
            Ok(total)
        })
    }

    fn close(self) {
        // Dropping the session closes the underlying SSH channel
        drop(self.sftp);
        debug!("SFTP channel closed");
    }
}

/// Build a DirectoryEntry from SFTP attributes
///
/// Entries without a (non-zero) mode cannot be classified and are dropped.
fn entry_from_attributes(
    parent: &str,
    name: &str,
    attrs: &FileAttributes,
) -> Option<DirectoryEntry> {
    let mode = attrs.permissions.filter(|mode| *mode != 0)?;
    Some(DirectoryEntry {
        name: name.to_string(),
        path: join_remote_path(parent, name),
        kind: EntryType::from_mode(mode),
        size: attrs.size.unwrap_or(0),
        uid: attrs.uid,
        gid: attrs.gid,
        mode: attrs.permissions,
        atime: attrs.atime.map(i64::from),
        mtime: attrs.mtime.map(i64::from),
    })
}

/// Map SFTP status codes to our error type
fn map_sftp_error(err: SftpClientError, path: &str) -> RemoteError {
    match err {
        SftpClientError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => RemoteError::NotFound {
                path: path.to_string(),
            },
            StatusCode::PermissionDenied => RemoteError::PermissionDenied {
                path: path.to_string(),
            },
            _ => RemoteError::Protocol {
                path: path.to_string(),
                message: status.error_message,
            },
        },
        other => RemoteError::Protocol {
            path: path.to_string(),
            message: other.to_string(),
        },
    }
}

fn map_io_error(err: std::io::Error, path: &str) -> RemoteError {
    match err.kind() {
        std::io::ErrorKind::PermissionDenied => RemoteError::PermissionDenied {
            path: path.to_string(),
        },
        std::io::ErrorKind::NotFound => RemoteError::NotFound {
            path: path.to_string(),
        },
        _ => RemoteError::Io {
            path: path.to_string(),
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_host_only() {
        let t = SftpTarget::parse("files.example.com").unwrap();
        assert_eq!(t.host, "files.example.com");
        assert_eq!(t.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_target_with_port_and_scheme() {
        let t = SftpTarget::parse("sftp://10.0.0.5:2222/").unwrap();
        assert_eq!(t, SftpTarget::new("10.0.0.5", 2222));
        assert_eq!(t.to_string(), "sftp://10.0.0.5:2222");
    }

    #[test]
    fn test_parse_target_ipv6() {
        let t = SftpTarget::parse("[::1]:2022").unwrap();
        assert_eq!(t, SftpTarget::new("::1", 2022));
        assert_eq!(t.to_string(), "sftp://[::1]:2022");

        let bare = SftpTarget::parse("fe80::1").unwrap();
        assert_eq!(bare.port, DEFAULT_PORT);
    }

    #[test]
    fn test_parse_target_invalid() {
        assert!(SftpTarget::parse("").is_err());
        assert!(SftpTarget::parse("host:0").is_err());
        assert!(SftpTarget::parse("host:99999").is_err());
        assert!(SftpTarget::parse(":22").is_err());
        assert!(SftpTarget::parse("[::1").is_err());
    }

    #[test]
    fn test_entry_from_attributes() {
        let attrs = FileAttributes {
            size: Some(12),
            permissions: Some(0o100644),
            mtime: Some(1_704_067_200),
            ..Default::default()
        };
        let entry = entry_from_attributes("/data", "a.txt", &attrs).unwrap();
        assert_eq!(entry.path, "/data/a.txt");
        assert_eq!(entry.kind, EntryType::File);
        assert_eq!(entry.size, 12);

        let dir = FileAttributes {
            permissions: Some(0o040755),
            ..Default::default()
        };
        assert!(entry_from_attributes("/", "sub", &dir).unwrap().is_dir());
    }

    #[test]
    fn test_entry_without_mode_is_skipped() {
        let no_mode = FileAttributes {
            size: Some(5),
            permissions: None,
            ..Default::default()
        };
        assert!(entry_from_attributes("/data", "x", &no_mode).is_none());

        let zero_mode = FileAttributes {
            permissions: Some(0),
            ..Default::default()
        };
        assert!(entry_from_attributes("/data", "y", &zero_mode).is_none());
    }

    #[test]
    fn test_map_io_error() {
        let denied = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(map_io_error(denied, "/f").is_permission_denied());
        let other = std::io::Error::other("boom");
        assert!(matches!(map_io_error(other, "/f"), RemoteError::Io { .. }));
    }
}
