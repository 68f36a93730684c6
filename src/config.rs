//! Configuration types for sftp-walker
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::remote::{AuthMethod, Credentials, SftpTarget};
use crate::remote::sftp::{DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::walker::{ErrorPolicy, TraversalOptions, DEFAULT_WORKERS, MATCH_ALL};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parallel SFTP directory walker
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sftp-walker",
    version,
    about = "Parallel SFTP directory walker",
    long_about = "Lists, previews or downloads files under a remote directory over SFTP.\n\n\
                  Directories are listed in parallel, one SFTP channel per worker, and \
                  every file whose name fully matches the pattern is reported.",
    after_help = "EXAMPLES:\n    \
        sftp-walker list --host server --user me /data --regex '.*\\.csv'\n    \
        sftp-walker preview --host server --user me /data --error-handling warning\n    \
        sftp-walker download --host server --user me --auth key --key-file ~/.ssh/id_ed25519 /data --to ./out\n    \
        sftp-walker download --host server --user me --input files.txt --to ./out"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Print entries as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List matching files
    List {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        walk: WalkArgs,

        /// Remote directory to walk
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Show the first few matches and denials
    Preview {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        walk: WalkArgs,

        /// Remote directory to walk
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Download matching files (or the files listed in --input)
    Download {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(flatten)]
        walk: WalkArgs,

        /// Remote directory to walk
        #[arg(value_name = "PATH", required_unless_present = "input")]
        path: Option<String>,

        /// Local directory to write files into
        #[arg(long, value_name = "DIR", default_value = ".")]
        to: PathBuf,

        /// File with one remote path per line to download instead of walking
        #[arg(long, value_name = "FILE", conflicts_with = "path")]
        input: Option<PathBuf>,
    },
}

/// Connection flags shared by all subcommands
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Server hostname or IP (host, host:port or sftp://host:port)
    #[arg(long, value_name = "HOST")]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT, value_name = "PORT")]
    pub port: u16,

    /// Remote user name
    #[arg(short = 'u', long, value_name = "USER")]
    pub user: String,

    /// Authentication method (password, key, key-with-password)
    #[arg(long, default_value = "password", value_name = "METHOD")]
    pub auth: String,

    /// Private key file for key-based authentication
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,

    /// Password, or key passphrase for key-with-password
    #[arg(long, env = "SFTP_WALKER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connection timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs(), value_name = "SECS")]
    pub timeout: u64,

    /// Number of retry attempts for transient connection errors
    #[arg(long, default_value = "3", value_name = "NUM")]
    pub retries: u32,
}

/// Traversal flags shared by all subcommands
#[derive(Args, Debug, Clone)]
pub struct WalkArgs {
    /// Pattern a file name must fully match
    #[arg(short = 'r', long, default_value = MATCH_ALL, value_name = "REGEX")]
    pub regex: String,

    /// Only look at the given directory, not its subdirectories
    #[arg(long)]
    pub no_subfolder: bool,

    /// Stop after this many matches (-1 for unlimited)
    #[arg(
        short = 'm',
        long,
        default_value = "-1",
        allow_negative_numbers = true,
        value_name = "NUM"
    )]
    pub max_matches: i64,

    /// Number of worker threads (1-32)
    #[arg(short = 'w', long, default_value_t = DEFAULT_WORKERS, value_name = "NUM")]
    pub workers: usize,

    /// What to do on permission errors (ignore, warning, error)
    #[arg(long, default_value = "error", value_name = "MODE")]
    pub error_handling: String,
}

/// What the run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Walk and print matches
    List,
    /// Walk with a small cap and print a text report
    Preview,
    /// Walk and download matches into `dir`
    Download { dir: PathBuf },
    /// Download the given remote paths into `dir`
    DownloadList { dir: PathBuf, paths: Vec<String> },
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct WalkConfig {
    pub mode: Mode,

    /// Server to connect to
    pub target: SftpTarget,

    pub credentials: Credentials,

    /// Connection timeout
    pub timeout: Duration,

    /// Retry count for transient connection errors
    pub retries: u32,

    /// Remote directory to walk (empty for `DownloadList`)
    pub root: String,

    /// Validated traversal options (without hooks)
    pub options: TraversalOptions,

    /// Show progress indicator
    pub show_progress: bool,

    /// Verbose logging
    pub verbose: bool,

    /// JSON line output
    pub json: bool,
}

impl WalkConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let (connection, walk, root, mode) = match args.command {
            Command::List {
                connection,
                walk,
                path,
            } => (connection, walk, path, Mode::List),
            Command::Preview {
                connection,
                walk,
                path,
            } => (connection, walk, path, Mode::Preview),
            Command::Download {
                connection,
                walk,
                path,
                to,
                input,
            } => {
                let mode = match input {
                    Some(file) => Mode::DownloadList {
                        dir: to,
                        paths: read_input_list(&file)?,
                    },
                    None => Mode::Download { dir: to },
                };
                (connection, walk, path.unwrap_or_default(), mode)
            }
        };

        if root.trim().is_empty() && !matches!(mode, Mode::DownloadList { .. }) {
            return Err(ConfigError::InvalidTarget("remote path is empty".into()));
        }

        let mut target = SftpTarget::parse(&connection.host)?;
        if !connection.host.contains(':') || connection.port != DEFAULT_PORT {
            target.port = connection.port;
        }

        let credentials = build_credentials(&connection)?;
        credentials.validate()?;

        if connection.timeout == 0 {
            return Err(ConfigError::InvalidTarget("timeout must be at least 1 second".into()));
        }

        let options = TraversalOptions::builder(walk.regex)
            .recurse(!walk.no_subfolder)
            .max_matches(walk.max_matches)
            .workers(walk.workers)
            .error_policy(walk.error_handling.parse::<ErrorPolicy>()?)
            .build()?;

        Ok(Self {
            mode,
            target,
            credentials,
            timeout: Duration::from_secs(connection.timeout),
            retries: connection.retries,
            root,
            options,
            show_progress: !args.quiet && !args.json,
            verbose: args.verbose,
            json: args.json,
        })
    }
}

fn build_credentials(connection: &ConnectionArgs) -> Result<Credentials, ConfigError> {
    let method: AuthMethod = connection.auth.parse()?;
    let private_key = match (&connection.key_file, method) {
        (_, AuthMethod::Password) => None,
        (Some(path), _) => Some(fs::read_to_string(path).map_err(|e| {
            ConfigError::MissingCredentials(format!(
                "cannot read key file '{}': {}",
                path.display(),
                e
            ))
        })?),
        (None, _) => {
            return Err(ConfigError::MissingCredentials(format!(
                "--key-file is required for {} authentication",
                method
            )))
        }
    };

    Ok(Credentials {
        username: connection.user.clone(),
        method,
        password: connection.password.clone(),
        private_key,
    })
}

/// Read remote paths from a file, one per line, skipping blanks and `#` comments
fn read_input_list(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|e| {
        ConfigError::InvalidTarget(format!("cannot read input file '{}': {}", path.display(), e))
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse(args: &[&str]) -> Result<WalkConfig, ConfigError> {
        let mut argv = vec!["sftp-walker"];
        argv.extend_from_slice(args);
        WalkConfig::from_args(CliArgs::parse_from(argv))
    }

    #[test]
    fn test_list_defaults() {
        let config = parse(&["list", "--host", "server", "--user", "me", "--password", "pw", "/data"])
            .unwrap();
        assert_eq!(config.mode, Mode::List);
        assert_eq!(config.root, "/data");
        assert_eq!(config.target.host, "server");
        assert_eq!(config.target.port, 22);
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.retries, 3);
        assert_eq!(config.options.pattern(), "^.*$");
        assert!(config.options.recurse());
        assert_eq!(config.options.max_matches(), None);
        assert_eq!(config.options.workers(), 32);
        assert_eq!(config.options.error_policy(), ErrorPolicy::Abort);
        assert!(config.show_progress);
    }

    #[test]
    fn test_walk_flags() {
        let config = parse(&[
            "preview",
            "--host",
            "sftp://server:2222",
            "--user",
            "me",
            "--password",
            "pw",
            "--regex",
            r".*\.csv",
            "--no-subfolder",
            "--max-matches",
            "5",
            "--workers",
            "4",
            "--error-handling",
            "warning",
            "--json",
            "/data",
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::Preview);
        assert_eq!(config.target.port, 2222);
        assert!(!config.options.recurse());
        assert_eq!(config.options.max_matches(), Some(5));
        assert_eq!(config.options.workers(), 4);
        assert_eq!(config.options.error_policy(), ErrorPolicy::Warn);
        assert!(config.json);
        assert!(!config.show_progress);
    }

    #[test]
    fn test_port_flag() {
        let config = parse(&[
            "list", "--host", "server", "--port", "2200", "--user", "me", "--password", "pw", "/",
        ])
        .unwrap();
        assert_eq!(config.target.port, 2200);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ["list", "--host", "server", "--user", "me", "--password", "pw"];

        let mut args = base.to_vec();
        args.extend(["--workers", "0", "/"]);
        assert!(matches!(parse(&args), Err(ConfigError::InvalidWorkerCount { .. })));

        let mut args = base.to_vec();
        args.extend(["--workers", "64", "/"]);
        assert!(matches!(parse(&args), Err(ConfigError::InvalidWorkerCount { .. })));

        let mut args = base.to_vec();
        args.extend(["--max-matches", "-5", "/"]);
        assert!(matches!(parse(&args), Err(ConfigError::InvalidMaxMatches(-5))));

        let mut args = base.to_vec();
        args.extend(["--regex", "(", "/"]);
        assert!(matches!(parse(&args), Err(ConfigError::InvalidPattern { .. })));

        let mut args = base.to_vec();
        args.extend(["--error-handling", "loud", "/"]);
        assert!(matches!(parse(&args), Err(ConfigError::InvalidErrorPolicy(_))));
    }

    #[test]
    fn test_missing_password() {
        let err = parse(&["list", "--host", "server", "--user", "me", "/"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
    }

    #[test]
    fn test_key_auth_requires_key_file() {
        let err = parse(&["list", "--host", "server", "--user", "me", "--auth", "key", "/"])
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
    }

    #[test]
    fn test_key_auth_reads_key_file() {
        let mut key = NamedTempFile::new().unwrap();
        writeln!(key, "KEY MATERIAL").unwrap();
        let config = parse(&[
            "list",
            "--host",
            "server",
            "--user",
            "me",
            "--auth",
            "key",
            "--key-file",
            key.path().to_str().unwrap(),
            "/",
        ])
        .unwrap();
        assert_eq!(config.credentials.method, AuthMethod::Key);
        assert_eq!(config.credentials.private_key.as_deref(), Some("KEY MATERIAL\n"));
    }

    #[test]
    fn test_download_modes() {
        let config = parse(&[
            "download", "--host", "server", "--user", "me", "--password", "pw", "--to", "out",
            "/data",
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::Download { dir: PathBuf::from("out") });

        let mut list = NamedTempFile::new().unwrap();
        writeln!(list, "/data/a.txt\n\n# comment\n  /data/b.txt  ").unwrap();
        let config = parse(&[
            "download",
            "--host",
            "server",
            "--user",
            "me",
            "--password",
            "pw",
            "--input",
            list.path().to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(
            config.mode,
            Mode::DownloadList {
                dir: PathBuf::from("."),
                paths: vec!["/data/a.txt".to_string(), "/data/b.txt".to_string()],
            }
        );
    }
}
