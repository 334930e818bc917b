use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "plugin-hub")]
#[command(about = "Install and manage plugins and themes for the comment service")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base directory (default: ~/.plugin-hub)
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List plugins and themes from the cached registry and local installs
    List {
        /// Match names (substring) or ids (exact), case-insensitive
        #[arg(short, long)]
        search: Option<String>,

        /// Only show installed entries
        #[arg(short, long)]
        installed: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one plugin with its options
    Show {
        /// Plugin id
        id: String,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Install a plugin or theme from the registry
    Install {
        /// Plugin id
        id: String,
    },

    /// Upgrade an installed plugin to the registry version
    Upgrade {
        /// Plugin id
        id: String,
    },

    /// Uninstall a plugin (its options are kept)
    Uninstall {
        /// Plugin id
        id: String,
    },

    /// Set the enabled flag and client options of an installed plugin
    Update {
        /// Plugin id
        id: String,

        /// Enabled flag
        #[arg(long, action = ArgAction::Set)]
        enabled: bool,

        /// Client options as a JSON string
        #[arg(long)]
        client_options: Option<String>,
    },

    /// Enable an installed plugin
    Enable {
        /// Plugin id
        id: String,
    },

    /// Disable an installed plugin
    Disable {
        /// Plugin id
        id: String,
    },

    /// Show the plugins served to the comment widget
    Enabled {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the cached plugin registry
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },

    /// Inspect stored plugin options
    Options {
        #[command(subcommand)]
        action: OptionsAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum RegistryAction {
    /// Download the registry and replace the cache
    Update,

    /// Summarize the cached registry
    Show,
}

#[derive(Subcommand)]
pub enum OptionsAction {
    /// List option rows whose plugin is no longer installed
    Orphans,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g., plugin.registry_url)
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., plugin.registry_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}
