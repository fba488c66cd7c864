use std::path::PathBuf;

use crate::cli::Cli;
use crate::types::LogLevel;

/// Which object-store backend uploads go to.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Local directory mirror; objects land at `<root>/<bucket>/<path>`.
    Fs { root: PathBuf },
    /// HTTP gateway; objects go to `PUT <base>/<bucket>/<path>`.
    Http {
        base_url: String,
        token: Option<String>,
    },
}

impl std::fmt::Debug for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fs { root } => f.debug_struct("Fs").field("root", root).finish(),
            Self::Http { base_url, token } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Application configuration, validated and with paths expanded.
pub struct Config {
    pub uid: String,
    pub cookie: Option<String>,
    pub state_db: PathBuf,
    pub bucket: String,
    pub backend: StoreBackend,
    pub days: u32,
    pub log_level: LogLevel,
    pub full: bool,
    pub history: bool,
    pub no_progress_bar: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("uid", &self.uid)
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("state_db", &self.state_db)
            .field("bucket", &self.bucket)
            .field("backend", &self.backend)
            .field("days", &self.days)
            .finish_non_exhaustive()
    }
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        if cli.days == 0 {
            anyhow::bail!("--days must be at least 1");
        }
        if cli.store_token.is_some() && cli.store_url.is_none() {
            anyhow::bail!("--store-token only makes sense together with --store-url");
        }

        let backend = match (&cli.store_url, &cli.store_root) {
            (Some(_), Some(_)) => {
                anyhow::bail!("--store-url and --store-root are mutually exclusive")
            }
            (Some(url), None) => StoreBackend::Http {
                base_url: url.trim_end_matches('/').to_string(),
                token: cli.store_token.clone(),
            },
            (None, Some(root)) => StoreBackend::Fs {
                root: expand_tilde(root),
            },
            (None, None) => StoreBackend::Fs {
                root: expand_tilde("~/.tadpoles-sync/media"),
            },
        };

        Ok(Self {
            uid: cli.uid,
            cookie: cli.cookie,
            state_db: expand_tilde(&cli.state_db),
            bucket: cli.bucket,
            backend,
            days: cli.days,
            log_level: cli.log_level,
            full: cli.full,
            history: cli.history,
            no_progress_bar: cli.no_progress_bar,
        })
    }
}
