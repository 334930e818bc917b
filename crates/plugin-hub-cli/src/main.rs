use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use plugin_hub_core::config::Config;
use plugin_hub_core::plugin::fetcher::registry_url;
use plugin_hub_core::{
    default_base_dir, CookedPlugin, ListQuery, PluginHubError, PluginManager, PluginUpdate, Result,
};

mod args;
use args::{Cli, Commands, ConfigAction, OptionsAction, RegistryAction, Shell};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let base_dir = match resolve_base_dir(cli.base_dir) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let result = match cli.command {
        Some(Commands::List {
            search,
            installed,
            json,
        }) => handle_list(&base_dir, search, installed, json),
        Some(Commands::Show { id, json }) => handle_show(&base_dir, &id, json),
        Some(Commands::Install { id }) => handle_install(&base_dir, &id),
        Some(Commands::Upgrade { id }) => handle_upgrade(&base_dir, &id),
        Some(Commands::Uninstall { id }) => handle_uninstall(&base_dir, &id),
        Some(Commands::Update {
            id,
            enabled,
            client_options,
        }) => handle_update(&base_dir, &id, enabled, client_options),
        Some(Commands::Enable { id }) => handle_update(&base_dir, &id, true, None),
        Some(Commands::Disable { id }) => handle_update(&base_dir, &id, false, None),
        Some(Commands::Enabled { json }) => handle_enabled(&base_dir, json),
        Some(Commands::Registry { action }) => handle_registry(action, &base_dir),
        Some(Commands::Options { action }) => handle_options(action, &base_dir),
        Some(Commands::Config { action }) => handle_config(action, &base_dir),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(status = e.status_code(), "command failed");
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "plugin-hub", &mut io::stdout());
}

fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(base) = cli_base {
        return Ok(base);
    }

    if let Ok(base) = std::env::var("PLUGIN_HUB_BASE") {
        return Ok(PathBuf::from(base));
    }

    default_base_dir()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
    println!("{}", out);
    Ok(())
}

fn status_label(plugin: &CookedPlugin) -> String {
    if !plugin.installed {
        return "available".dimmed().to_string();
    }
    let state = if plugin.enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    if plugin.upgrade_available {
        format!("{} {}", state, "(upgrade)".cyan())
    } else {
        state.to_string()
    }
}

fn print_section(title: &str, plugins: &[CookedPlugin]) {
    println!("{} ({})", title.cyan().bold(), plugins.len());
    if plugins.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }

    for plugin in plugins {
        let version = if plugin.installed && plugin.local_version != plugin.item.version {
            format!("{} -> {}", plugin.local_version, plugin.item.version)
        } else {
            plugin.item.version.clone()
        };
        let verified = if plugin.item.verified { " ✓" } else { "" };

        println!(
            "  {}{} {} {} [{}]",
            plugin.name().bold(),
            verified.green(),
            format!("({})", plugin.id()).dimmed(),
            version,
            status_label(plugin)
        );
        if !plugin.compatible {
            println!("    {}", plugin.compatible_notice.red());
        }
    }
}

fn handle_list(
    base_dir: &Path,
    search: Option<String>,
    only_installed: bool,
    json: bool,
) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;
    let listing = manager.list(&ListQuery {
        search,
        only_installed,
    })?;

    if json {
        return print_json(&listing);
    }

    if listing.plugins.is_empty() && listing.themes.is_empty() && manager.registry()?.is_empty() {
        println!(
            "{}",
            "Registry cache is empty. Run `plugin-hub registry update` first.".yellow()
        );
        return Ok(());
    }

    println!();
    print_section("Plugins", &listing.plugins);
    println!();
    print_section("Themes", &listing.themes);
    println!();

    Ok(())
}

fn handle_show(base_dir: &Path, id: &str, json: bool) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;
    let detail = manager.get(id)?;

    if json {
        return print_json(&detail);
    }

    let plugin = &detail.plugin;
    if plugin.id().is_empty() {
        return Err(PluginHubError::NotFound { id: id.to_string() });
    }

    println!();
    println!("{} {}", plugin.name().cyan().bold(), format!("({})", plugin.id()).dimmed());
    if !plugin.item.description.is_empty() {
        println!("{}", plugin.item.description);
    }
    println!();
    println!("  Type: {}", plugin.item.kind);
    println!("  Status: {}", status_label(plugin));
    println!("  Registry version: {}", plugin.item.version);
    if plugin.installed {
        println!("  Local version: {}", plugin.local_version);
    }
    if !plugin.item.author_name.is_empty() {
        println!("  Author: {} {}", plugin.item.author_name, plugin.item.author_link.dimmed());
    }
    if !plugin.item.repo_link.is_empty() {
        println!("  Repository: {}", plugin.item.repo_link);
    }
    println!("  Source: {}", plugin.item.source);
    if !plugin.compatible {
        println!("  {}", plugin.compatible_notice.red());
    }

    if plugin.installed {
        println!();
        println!(
            "  Client options: {}",
            non_empty_or(&detail.client_options, "(none)")
        );
        println!(
            "  Options schema: {}",
            if detail.options_schema.is_empty() {
                "(none)".dimmed().to_string()
            } else {
                format!("{} bytes", detail.options_schema.len())
            }
        );
    }
    println!();

    Ok(())
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn handle_install(base_dir: &Path, id: &str) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;

    println!("Installing {}...", id.cyan());
    let plugin = manager.install(id)?;

    println!(
        "{} {} v{} ({})",
        "Installed:".green(),
        plugin.name,
        plugin.version,
        plugin.kind
    );
    Ok(())
}

fn handle_upgrade(base_dir: &Path, id: &str) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;

    println!("Upgrading {}...", id.cyan());
    let plugin = manager.upgrade(id)?;

    println!("{} {} v{}", "Upgraded:".green(), plugin.name, plugin.version);
    Ok(())
}

fn handle_uninstall(base_dir: &Path, id: &str) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;
    manager.uninstall(id)?;

    println!("{} {}", "Uninstalled:".green(), id);
    println!(
        "{}",
        "Stored options were kept; see `plugin-hub options orphans`.".dimmed()
    );
    Ok(())
}

fn handle_update(
    base_dir: &Path,
    id: &str,
    enabled: bool,
    client_options: Option<String>,
) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;
    let options_changed = client_options.as_deref().is_some_and(|s| !s.is_empty());

    let plugin = manager.update(
        id,
        &PluginUpdate {
            enabled,
            client_options,
        },
    )?;

    println!("{} {} [{}]", "Updated:".green(), id, status_label(&plugin));
    if options_changed {
        println!("  Client options saved");
    }
    Ok(())
}

fn handle_enabled(base_dir: &Path, json: bool) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;
    let plugins = manager.enabled_plugins()?;

    if json {
        return print_json(&plugins);
    }

    if !manager.settings().enabled {
        println!("{}", "Plugins are switched off (plugin.enabled = false)".yellow());
        return Ok(());
    }

    println!();
    for plugin in &plugins {
        println!("  [{}] {}", plugin.kind, plugin.source);
        if !plugin.integrity.is_empty() {
            println!("    {}", plugin.integrity.dimmed());
        }
    }
    println!();
    println!("Total: {}", plugins.len());

    Ok(())
}

fn handle_registry(action: RegistryAction, base_dir: &Path) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;

    match action {
        RegistryAction::Update => {
            let url = registry_url(&manager.settings().registry_url);
            println!("Fetching {}...", url.dimmed());

            let snapshot = manager.refresh_registry()?;
            println!(
                "{} {} plugins, {} themes",
                "Registry updated:".green(),
                snapshot.plugins.len(),
                snapshot.themes.len()
            );
        }
        RegistryAction::Show => {
            let snapshot = manager.registry()?;
            if snapshot.is_empty() {
                println!("{}", "Registry cache is empty.".yellow());
                return Ok(());
            }
            println!("Registry: {}", manager.settings().registry_url);
            println!("  Plugins: {}", snapshot.plugins.len());
            println!("  Themes: {}", snapshot.themes.len());
        }
    }

    Ok(())
}

fn handle_options(action: OptionsAction, base_dir: &Path) -> Result<()> {
    let manager = PluginManager::open(base_dir)?;

    match action {
        OptionsAction::Orphans => {
            let orphans = manager.orphaned_options()?;
            if orphans.is_empty() {
                println!("No orphaned options.");
                return Ok(());
            }

            println!();
            for opt in &orphans {
                println!(
                    "  {} {} {}",
                    opt.plugin_id.yellow(),
                    opt.name,
                    format!("(updated {})", opt.updated_at.format("%Y-%m-%d %H:%M")).dimmed()
                );
            }
            println!();
            println!("Total: {}", orphans.len());
        }
    }

    Ok(())
}

fn handle_config(action: ConfigAction, base_dir: &Path) -> Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load(base_dir)?;
            match config.get(&key) {
                Some(value) => {
                    println!("{}", value);
                }
                None => {
                    return Err(PluginHubError::ConfigKeyNotFound { key });
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load(base_dir)?;
            config.set(&key, &value)?;
            config.save(base_dir)?;
            println!("{} {} = {}", "Set:".green(), key, value);
        }
        ConfigAction::List => {
            let config = Config::load(base_dir)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = Config::path(base_dir);
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(base_dir)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}
