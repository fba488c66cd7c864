use clap::Parser;

use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "tadpoles-sync",
    about = "Mirror tadpoles.com event attachments into object storage"
)]
pub struct Cli {
    /// Account email, sent as the tadpoles identity header
    #[arg(short = 'u', long, env = "TADPOLES_UID")]
    pub uid: String,

    /// Session cookie for www.tadpoles.com (if not provided, the cached
    /// cookie is tried, then an interactive prompt).
    /// WARNING: passing via --cookie is visible in process listings.
    /// Prefer the TADPOLES_COOKIE environment variable instead.
    #[arg(long, env = "TADPOLES_COOKIE")]
    pub cookie: Option<String>,

    /// Sync window length in days
    #[arg(long, env = "TADPOLES_SYNC_DAYS", default_value_t = 45)]
    pub days: u32,

    /// SQLite state database holding the checkpoint and run history
    #[arg(long, env = "TADPOLES_STATE_DB", default_value = "~/.tadpoles-sync/state.db")]
    pub state_db: String,

    /// Bucket name objects are stored under
    #[arg(long, env = "TADPOLES_BUCKET", default_value = "tadpoles")]
    pub bucket: String,

    /// Root directory of the local filesystem store
    #[arg(long, env = "TADPOLES_STORE_ROOT")]
    pub store_root: Option<String>,

    /// Base URL of an HTTP object-store gateway (instead of --store-root)
    #[arg(long, env = "TADPOLES_STORE_URL")]
    pub store_url: Option<String>,

    /// Bearer token for the HTTP object-store gateway.
    /// Prefer the TADPOLES_STORE_TOKEN environment variable.
    #[arg(long, env = "TADPOLES_STORE_TOKEN")]
    pub store_token: Option<String>,

    /// Ignore the checkpoint and walk the full history again
    #[arg(long)]
    pub full: bool,

    /// Print recent sync runs and exit
    #[arg(long)]
    pub history: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Disable progress bar
    #[arg(long)]
    pub no_progress_bar: bool,
}
