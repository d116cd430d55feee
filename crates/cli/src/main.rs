// murmur CLI - inspect and edit device settings from the shell

mod exit_codes;

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use murmur_config::migration::{is_theme_setting, DARK_THEME, LIGHT_THEME, THEME_IN_USE};
use murmur_config::theme::toggle_theme_in_use;
use murmur_config::{
    ConfigError, DeviceConfig, DeviceSettingsHandler, Dispatcher, FileStorage, LocalStorage,
    MemoryStorage, SettingLevel, SettingsError, SettingsHandler, SystemSignals, ThemeApplier,
    ThemeWatcher, WatchManager,
};

use exit_codes::{EXIT_CONFIG, EXIT_ERROR, EXIT_STORAGE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Read and write device settings, resolve the active theme")]
#[command(version)]
struct Cli {
    /// Device config file (TOML)
    #[arg(long, global = true, env = "MURMUR_CONFIG")]
    config: Option<PathBuf>,

    /// Local storage file (overrides the config)
    #[arg(long, global = true, env = "MURMUR_STORE")]
    store: Option<PathBuf>,

    /// Keep everything in memory; nothing is read from or written to disk
    #[arg(long, global = true, conflicts_with = "store")]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a setting's device value as JSON (null when unset)
    Get {
        name: String,
    },

    /// Write a setting and print the notifications it fired
    #[command(after_help = "\
Examples:
  murmur set layout '\"bubble\"'
  murmur set theme_in_use dark
  murmur set feature_threads true
  murmur set feature_threads null

VALUE is parsed as JSON; anything that isn't valid JSON is taken as a string.")]
    Set {
        name: String,
        value: String,
    },

    /// Whether the setting can be written at device level
    CanSet {
        name: String,
    },

    /// List known features and their flag (true, false or unset)
    Features,

    /// Resolve the theme that would be applied
    Theme {
        /// OS reports prefers-color-scheme: dark
        #[arg(long)]
        prefers_dark: bool,

        /// OS reports prefers-color-scheme: light
        #[arg(long)]
        prefers_light: bool,

        /// Resolve as a login-only view
        #[arg(long)]
        login: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Switch theme_in_use between light and dark
    ToggleTheme,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    let result = open_context(&cli).and_then(|ctx| match cli.command {
        Commands::Get { name } => cmd_get(&ctx, &name),
        Commands::Set { name, value } => cmd_set(&ctx, &name, &value),
        Commands::CanSet { name } => cmd_can_set(&ctx, &name),
        Commands::Features => cmd_features(&ctx),
        Commands::Theme { prefers_dark, prefers_light, login, json } => {
            cmd_theme(&ctx, prefers_dark, prefers_light, login, json)
        }
        Commands::ToggleTheme => cmd_toggle_theme(&ctx),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message }) => {
            eprintln!("error: {}", message);
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
}

impl CliError {
    fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into() }
    }
}

impl From<SettingsError> for CliError {
    fn from(e: SettingsError) -> Self {
        Self { code: EXIT_STORAGE, message: e.to_string() }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self { code: EXIT_CONFIG, message: e.to_string() }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self { code: EXIT_ERROR, message: e.to_string() }
    }
}

struct Context {
    config: DeviceConfig,
    settings: Rc<DeviceSettingsHandler>,
}

fn open_context(cli: &Cli) -> Result<Context, CliError> {
    let config = match &cli.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::load_or_default(&DeviceConfig::config_path()),
    };

    let storage: Rc<dyn LocalStorage> = if cli.ephemeral {
        Rc::new(MemoryStorage::new())
    } else {
        let path = cli.store.clone().unwrap_or_else(|| config.storage_path());
        log::debug!("Using local storage at {}", path.display());
        Rc::new(FileStorage::new(path))
    };

    let settings = Rc::new(DeviceSettingsHandler::new(
        config.features.clone(),
        storage,
        Rc::new(WatchManager::new()),
    ));

    Ok(Context { config, settings })
}

/// Parse a command-line value: JSON if it parses, otherwise a bare string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn cmd_get(ctx: &Context, name: &str) -> Result<(), CliError> {
    let value = ctx.settings.get_value(name, None)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn cmd_set(ctx: &Context, name: &str, raw: &str) -> Result<(), CliError> {
    if name.trim().is_empty() {
        return Err(CliError::usage("setting name must not be empty"));
    }
    let value = parse_value(raw);

    // A theme write reports all three theme settings
    let watched: Vec<&str> = if is_theme_setting(name) {
        vec![THEME_IN_USE, LIGHT_THEME, DARK_THEME]
    } else {
        vec![name]
    };

    let fired = Rc::new(RefCell::new(Vec::new()));
    let refs: Vec<_> = watched
        .iter()
        .map(|setting| {
            let fired = Rc::clone(&fired);
            let tag = setting.to_string();
            ctx.settings.watch_setting(
                setting,
                None,
                Box::new(move |_: Option<&str>, level: SettingLevel, value: &Value| {
                    fired.borrow_mut().push((tag.clone(), level, value.clone()));
                }),
            )
        })
        .collect();

    let result = ctx.settings.set_value(name, None, value);
    for watch in refs {
        ctx.settings.unwatch_setting(watch);
    }
    result?;

    for (setting, level, value) in fired.borrow().iter() {
        println!("{} [{}] = {}", setting, level, value);
    }
    Ok(())
}

fn cmd_can_set(ctx: &Context, name: &str) -> Result<(), CliError> {
    println!("{}", ctx.settings.can_set_value(name, None));
    Ok(())
}

fn cmd_features(ctx: &Context) -> Result<(), CliError> {
    if ctx.settings.feature_names().is_empty() {
        eprintln!("No features configured (add `features = [...]` to {})",
            DeviceConfig::config_path().display());
        return Ok(());
    }
    for feature in ctx.settings.feature_names() {
        let state = match ctx.settings.read_feature(feature)? {
            Some(true) => "enabled",
            Some(false) => "disabled",
            None => "unset",
        };
        println!("{:<40} {}", feature, state);
    }
    Ok(())
}

/// Theme application is someone else's job; the CLI only reports.
struct ReportOnly;

impl ThemeApplier for ReportOnly {
    fn set_theme(&self, theme: &str) {
        log::info!("Would apply theme '{}'", theme);
    }
}

fn cmd_theme(
    ctx: &Context,
    prefers_dark: bool,
    prefers_light: bool,
    login: bool,
    json: bool,
) -> Result<(), CliError> {
    let watcher = ThemeWatcher::new(
        ctx.settings.clone(),
        SystemSignals::new(prefers_dark, prefers_light, false),
        Rc::new(Dispatcher::new()),
        Rc::new(ReportOnly),
        ctx.config.theme.clone(),
    )?;

    if login || ctx.config.login_view {
        watcher.set_login_view(true);
        watcher.recheck(None)?;
    }

    let effective = watcher.current_theme();
    let simplified = watcher.current_theme_simplified()?;

    if json {
        let report = json!({
            "effective": effective,
            "simplified": simplified,
            "system_supported": watcher.is_system_theme_supported(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("effective:  {}", effective);
        println!("simplified: {}", simplified);
    }
    Ok(())
}

fn cmd_toggle_theme(ctx: &Context) -> Result<(), CliError> {
    let theme = toggle_theme_in_use(ctx.settings.as_ref(), &ctx.config.theme)?;
    println!("theme_in_use = {}", theme);
    Ok(())
}
