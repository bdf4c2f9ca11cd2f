use anyhow::Result;
use clap::{Parser, Subcommand};
use diagnostics_plugin::DiagnosticsExample;
use empty_plugin::EmptyExample;
use playhost_core::{init_logging, AppDirs, Config};
use playhost_runtime::{
    PlayerPlugin, PluginHost, PluginHostBuilder, PluginSummary, ReceiveDataService,
    SystemInformationService,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "playhost", version, about = "Player plugin host")]
struct Cli {
    /// Config file override (defaults to config.toml in the config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List built-in plugins
    Plugins,
    /// Host plugins for a while, optionally pushing values and app settings
    Run(RunCommand),
    /// Dispatch one command to the registered command handler
    Command(CommandArgs),
    /// Run plugin health checks
    Check(CheckCommand),
}

#[derive(Debug, Parser, Clone)]
struct RunCommand {
    /// Plugin to host (repeatable; defaults to every enabled plugin)
    #[arg(long = "plugin")]
    plugins: Vec<String>,
    /// How long to keep the host running
    #[arg(long, default_value_t = 30)]
    duration_secs: u64,
    /// Data value to push after start, as key=value
    #[arg(long = "value", value_parser = parse_key_value)]
    values: Vec<(String, String)>,
    /// App setting to change after start, as key=value
    #[arg(long = "app-setting", value_parser = parse_key_value)]
    app_settings: Vec<(String, String)>,
}

#[derive(Debug, Parser, Clone)]
struct CommandArgs {
    #[arg(long)]
    key: String,
    #[arg(long, default_value = "")]
    value: String,
    /// Overrides host.command_timeout_secs
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[arg(long = "plugin")]
    plugins: Vec<String>,
}

#[derive(Debug, Parser, Clone)]
struct CheckCommand {
    #[arg(long = "plugin")]
    plugins: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
enum CliError {
    #[error("expected key=value, got '{0}'")]
    MalformedPair(String),
    #[error("unknown plugin '{name}' (available: {available})")]
    UnknownPlugin { name: String, available: String },
    #[error("no plugins selected; enable one in config.toml or pass --plugin")]
    NothingSelected,
}

fn parse_key_value(raw: &str) -> Result<(String, String), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::MalformedPair(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::MalformedPair(raw.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

fn catalog() -> Vec<Arc<dyn PlayerPlugin>> {
    let empty: Arc<dyn PlayerPlugin> = Arc::new(EmptyExample::new());
    let diagnostics: Arc<dyn PlayerPlugin> = Arc::new(DiagnosticsExample::new());
    vec![empty, diagnostics]
}

/// Plugins named on the command line, or every plugin the config enables.
fn select_plugins(config: &Config, names: &[String]) -> Result<Vec<Arc<dyn PlayerPlugin>>, CliError> {
    let available = catalog();
    let selected: Vec<Arc<dyn PlayerPlugin>> = if names.is_empty() {
        available
            .into_iter()
            .filter(|plugin| config.plugin_enabled(plugin.name()))
            .collect()
    } else {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let plugin = available
                .iter()
                .find(|plugin| plugin.name() == name)
                .cloned()
                .ok_or_else(|| CliError::UnknownPlugin {
                    name: name.clone(),
                    available: available
                        .iter()
                        .map(|plugin| plugin.name().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;
            selected.push(plugin);
        }
        selected
    };

    if selected.is_empty() {
        return Err(CliError::NothingSelected);
    }
    Ok(selected)
}

fn start_host(config: &Config, plugins: Vec<Arc<dyn PlayerPlugin>>) -> Result<PluginHost> {
    let host = PluginHostBuilder::from_config(config).build()?;
    for plugin in plugins {
        let name = plugin.name().to_string();
        if let Err(err) = host.load(plugin) {
            tracing::warn!(plugin = %name, error = %err, "Plugin did not start");
            eprintln!("Plugin '{name}' did not start: {err}");
        }
    }
    Ok(host)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let dirs = AppDirs::discover()?;
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load_or_default(&dirs)?,
    };
    let _logging = init_logging(&config.logging, &dirs)?;

    match cli.command {
        Command::Plugins => print_catalog(&config),
        Command::Run(run) => {
            let host = start_host(&config, select_plugins(&config, &run.plugins)?)?;
            if !run.values.is_empty() {
                host.service::<ReceiveDataService>()?
                    .set_values(run.values.into_iter().collect());
            }
            if !run.app_settings.is_empty() {
                host.service::<SystemInformationService>()?
                    .update_app_settings(run.app_settings.into_iter().collect());
            }
            tracing::info!(duration_secs = run.duration_secs, "Hosting plugins");
            std::thread::sleep(Duration::from_secs(run.duration_secs));
            host.flush();
            print_status(&host.plugins());
            host.shutdown();
        }
        Command::Command(args) => {
            let host = start_host(&config, select_plugins(&config, &args.plugins)?)?;
            let timeout = args
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.host.command_timeout());
            let report = host.dispatch_command_with_timeout(&args.key, &args.value, timeout)?;
            for progress in &report.progress {
                println!("[{:>3.0}%] {}", progress.fraction * 100.0, progress.message);
            }
            println!("{}={} -> {}", report.key, report.value, report.result);
            host.shutdown();
        }
        Command::Check(check) => {
            let host = start_host(&config, select_plugins(&config, &check.plugins)?)?;
            for (name, result) in host.check_all() {
                match result {
                    Ok(true) => println!("{name}: ok"),
                    Ok(false) => println!("{name}: unhealthy ({})", host.status(&name)),
                    Err(err) => println!("{name}: not checked ({err})"),
                }
            }
            host.shutdown();
        }
    }

    Ok(())
}

fn print_catalog(config: &Config) {
    for plugin in catalog() {
        let descriptor = plugin.descriptor();
        let marker = if config.plugin_enabled(&descriptor.name) {
            ""
        } else {
            " (disabled)"
        };
        println!(
            "Plugin: {} {} by {}{}",
            descriptor.name, descriptor.version, descriptor.vendor, marker
        );
        println!("  {}", descriptor.documentation);
        let settings: BTreeMap<String, String> = descriptor
            .default_settings
            .into_iter()
            .chain(config.plugin_settings(&descriptor.name))
            .collect();
        if settings.is_empty() {
            println!("  settings: (none)");
        } else {
            for (key, value) in settings {
                println!("  - {key}={value}");
            }
        }
    }
}

fn describe(summary: &PluginSummary) -> String {
    let reported = summary
        .reported_state
        .as_ref()
        .map(|state| format!(" | {:?}: {}", state.state, state.message))
        .unwrap_or_default();
    format!("{}: {}{}", summary.descriptor.name, summary.status, reported)
}

fn print_status(plugins: &[PluginSummary]) {
    if plugins.is_empty() {
        println!("No plugins loaded.");
        return;
    }
    for summary in plugins {
        println!("{}", describe(summary));
    }
}
