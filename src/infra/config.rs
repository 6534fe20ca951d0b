use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cli::{AppContext, InitArgs, UpdatePolicy};

const CONFIG_FILE: &str = "keyup.toml";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config
{
    /// Sibling scan settings
    pub scan: ScanConfig,

    /// Default update settings
    pub update: UpdateConfig,

    /// Default export settings
    pub export: ExportConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig
{
    /// File-name globs never treated as versions of anything
    pub ignore: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig
{
    pub policy: UpdatePolicy,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig
{
    /// Output root used when --output is not given (~ and $VAR expanded)
    pub output_dir: Option<String>,
    pub force: bool,
}

impl Default for ScanConfig
{
    fn default() -> Self
    {
        Self {
            ignore: vec!["*~".to_string(), "*.bak".to_string(), "*.swp".to_string()],
        }
    }
}

impl ExportConfig
{
    /// Configured output root with `~` and environment variables expanded
    pub fn output_dir(&self) -> Result<Option<PathBuf>>
    {
        self.output_dir
            .as_deref()
            .map(|raw| {
                shellexpand::full(raw)
                    .map(|s| PathBuf::from(s.as_ref()))
                    .with_context(|| format!("Failed to expand export.output_dir '{raw}'"))
            })
            .transpose()
    }
}

pub fn load_config() -> Result<Config>
{
    let mut builder = config::Config::builder();

    // Load from config files in priority order
    let config_paths = [CONFIG_FILE, "keyup.yaml", "keyup.json", ".keyup.toml"];

    for path in &config_paths
    {
        if Path::new(path).exists()
        {
            builder = builder.add_source(config::File::with_name(path));
            break;
        }
    }

    // Environment overrides, e.g. KEYUP__UPDATE__POLICY=always
    builder = builder.add_source(
        config::Environment::with_prefix("KEYUP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("scan.ignore"),
    );

    let cfg = builder
        .build()
        .context("Failed to load configuration")?;
    let parsed: Config = cfg
        .try_deserialize()
        .context("Failed to parse configuration")?;

    Ok(parsed)
}

/// Load configuration for a command; a broken config is logged and
/// replaced by defaults so the command still runs.
pub fn load_config_or_default() -> Config
{
    match load_config()
    {
        Ok(config) => config,
        Err(e) =>
        {
            warn!(error = %format!("{e:#}"), "invalid configuration ignored, using defaults");
            Config::default()
        }
    }
}

pub fn init(
    args: InitArgs,
    ctx: &AppContext,
) -> Result<()>
{
    let config_path = args
        .path
        .join(CONFIG_FILE);

    if config_path.exists() && !args.force
    {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).context("Failed to serialize default config")?;

    if ctx.dry_run
    {
        if !ctx.quiet
        {
            println!("Would write {}:\n{toml_string}", config_path.display());
        }
        return Ok(());
    }

    std::fs::write(&config_path, toml_string).context("Failed to write config file")?;

    if !ctx.quiet
    {
        println!("Created config file at {}", config_path.display());
    }
    Ok(())
}
