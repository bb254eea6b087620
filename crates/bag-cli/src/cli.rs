use std::path::PathBuf;

use bag_core::RetrieveMode;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "bag")]
#[command(about = "Read it later from the terminal with a wallabag server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// CLI profile name holding server configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile the local store with the server
    Sync {
        /// Which slice of the collection to fetch
        #[arg(long, value_enum, default_value_t = ModeArg::All)]
        mode: ModeArg,
    },
    /// List stored articles
    List {
        /// Which articles to show
        #[arg(long, value_enum, default_value_t = ModeArg::Unarchived)]
        mode: ModeArg,
        /// Number of articles to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a URL on the server
    #[command(alias = "save")]
    Add {
        /// Article URL
        url: String,
    },
    /// Mark an article as read
    Archive {
        /// Entry ID
        id: String,
    },
    /// Mark an article as unread
    Unarchive {
        /// Entry ID
        id: String,
    },
    /// Star an article
    Star {
        /// Entry ID
        id: String,
    },
    /// Remove the star from an article
    Unstar {
        /// Entry ID
        id: String,
    },
    /// Delete an article on the server and locally
    Delete {
        /// Entry ID
        id: String,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Manage stored credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModeArg {
    All,
    #[value(alias = "read")]
    Archived,
    #[value(alias = "unread")]
    Unarchived,
    Starred,
}

impl From<ModeArg> for RetrieveMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::All => Self::All,
            ModeArg::Archived => Self::Archived,
            ModeArg::Unarchived => Self::Unarchived,
            ModeArg::Starred => Self::Starred,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Server URL, e.g. <https://app.wallabag.it>
        #[arg(long, value_name = "URL")]
        host: Option<String>,
        /// OAuth client id created in the server's developer settings
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// OAuth client secret
        #[arg(long, value_name = "SECRET")]
        client_secret: Option<String>,
        /// Account user name
        #[arg(long, value_name = "NAME")]
        username: Option<String>,
        /// Entries requested per listing page
        #[arg(long, value_name = "COUNT")]
        per_page: Option<u32>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Verify the password with the server and store it in the keychain
    Login {
        /// Account user name (defaults to the profile's)
        #[arg(long, value_name = "NAME")]
        username: Option<String>,
        /// Account password
        #[arg(long, value_name = "PASSWORD")]
        password: String,
    },
    /// Show credential status for profile
    Status,
    /// Remove the stored password for profile
    Logout,
}
