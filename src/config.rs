//! Configuration file support
//!
//! Presets are loaded from TOML. Discovery order:
//!
//! 1. `--config <path>` (must parse)
//! 2. `./comic-page-extract.toml`
//! 3. `<config_dir>/comic-page-extract/config.toml`
//!
//! A discovered file that fails to parse is ignored with a warning.
//!
//! # Example
//!
//! ```toml
//! default_preset = "covers"
//!
//! [presets.covers]
//! description = "Covers at 320 pixels high"
//! pages = 1
//! height = 320
//! overwrite = true
//! name_template = "{archive}-cover"
//! save_dirs = ["covers"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::codec::{OutputFormat, ResampleFilter};
use crate::combine::Direction;
use crate::edit::{CombineSpec, EditOptions, RotateSpec, SizeChange};
use crate::page_spec::PageSpec;
use crate::record::{PageSort, SortMethod, SortOrder};
use crate::report::DEFAULT_LOG_NAME;
use crate::save::{NameTemplate, SaveOptions};

/// Local config file name
pub const LOCAL_CONFIG_NAME: &str = "comic-page-extract.toml";

/// Directory under the user config dir
pub const USER_CONFIG_DIR: &str = "comic-page-extract";

/// Preset used when none is named
pub const DEFAULT_PRESET: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unknown preset '{0}'")]
    UnknownPreset(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================
// Preset
// ============================================================

/// Every option controlling one extract, edit and save run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub pages: PageSpec,
    pub sort: PageSort,
    pub width: SizeChange,
    pub height: SizeChange,
    pub keep_aspect_ratio: bool,
    #[serde(skip_serializing_if = "RotateSpec::is_empty")]
    pub rotate: RotateSpec,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub combine: Vec<CombineSpec>,
    pub resample: ResampleFilter,
    pub shrink_larger: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    pub search_sub_dirs: bool,
    pub overwrite: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_template: Option<NameTemplate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub save_dirs: Vec<PathBuf>,
    pub keep_archive_paths: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_root: Option<PathBuf>,
    pub create_log: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_report: Option<PathBuf>,
}

impl Default for Preset {
    fn default() -> Self {
        let edit = EditOptions::default();
        Self {
            description: None,
            pages: PageSpec::All,
            sort: PageSort::default(),
            width: edit.width,
            height: edit.height,
            keep_aspect_ratio: edit.keep_aspect_ratio,
            rotate: edit.rotate,
            combine: edit.combine,
            resample: edit.resample,
            shrink_larger: edit.shrink_larger,
            format: None,
            search_sub_dirs: false,
            overwrite: false,
            name_template: None,
            save_dirs: Vec::new(),
            keep_archive_paths: true,
            default_root: None,
            create_log: true,
            log_path: None,
            json_report: None,
        }
    }
}

impl Preset {
    pub fn edit_options(&self) -> EditOptions {
        EditOptions {
            width: self.width,
            height: self.height,
            keep_aspect_ratio: self.keep_aspect_ratio,
            rotate: self.rotate.clone(),
            combine: self.combine.clone(),
            resample: self.resample,
            shrink_larger: self.shrink_larger,
        }
    }

    pub fn save_options(&self) -> SaveOptions {
        SaveOptions {
            save_dirs: self.save_dirs.clone(),
            default_root: self.default_root(),
            name_template: self.name_template.clone(),
            format: self.format,
            overwrite: self.overwrite,
            keep_archive_paths: self.keep_archive_paths,
        }
    }

    fn default_root(&self) -> PathBuf {
        self.default_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Apply command line overrides and resolve into a run configuration
    pub fn merge_with_cli(mut self, name: &str, cli: &CliOverrides) -> RunConfig {
        if let Some(pages) = &cli.pages {
            self.pages = pages.clone();
        }
        if let Some(method) = cli.sort_method {
            self.sort.method = method;
        }
        if let Some(order) = cli.sort_order {
            self.sort.order = order;
        }
        if let Some(width) = cli.width {
            self.width = width;
        }
        if let Some(height) = cli.height {
            self.height = height;
        }
        if let Some(keep) = cli.keep_aspect_ratio {
            self.keep_aspect_ratio = keep;
        }
        if let Some(rotate) = &cli.rotate {
            self.rotate = rotate.clone();
        }
        if !cli.combine.is_empty() {
            self.combine = cli.combine.clone();
        }
        if let Some(resample) = cli.resample {
            self.resample = resample;
        }
        if let Some(format) = cli.format {
            self.format = Some(format);
        }
        if let Some(recursive) = cli.search_sub_dirs {
            self.search_sub_dirs = recursive;
        }
        if let Some(overwrite) = cli.overwrite {
            self.overwrite = overwrite;
        }
        if let Some(template) = &cli.name_template {
            self.name_template = Some(template.clone());
        }
        if !cli.save_dirs.is_empty() {
            self.save_dirs = cli.save_dirs.clone();
        }
        if let Some(keep) = cli.keep_archive_paths {
            self.keep_archive_paths = keep;
        }
        if let Some(root) = &cli.default_root {
            self.default_root = Some(root.clone());
        }
        if let Some(create) = cli.create_log {
            self.create_log = create;
        }
        if let Some(path) = &cli.log_path {
            self.log_path = Some(path.clone());
        }
        if let Some(path) = &cli.json_report {
            self.json_report = Some(path.clone());
        }

        let log_path = self.create_log.then(|| {
            self.log_path
                .clone()
                .unwrap_or_else(|| self.default_root().join(DEFAULT_LOG_NAME))
        });

        RunConfig {
            preset: name.to_string(),
            description: self.description.clone(),
            pages: self.pages.clone(),
            sort: self.sort,
            search_sub_dirs: self.search_sub_dirs,
            edit: self.edit_options(),
            save: self.save_options(),
            log_path,
            json_report: self.json_report.clone(),
            temp_root: cli.temp_root.clone(),
        }
    }
}

// ============================================================
// Built-in presets
// ============================================================

/// Presets available without a config file
pub fn builtin_presets() -> BTreeMap<String, Preset> {
    let mut presets = BTreeMap::new();

    presets.insert(
        DEFAULT_PRESET.to_string(),
        Preset {
            description: Some("Extract every page as is.".to_string()),
            ..Preset::default()
        },
    );

    presets.insert(
        "thumbnail".to_string(),
        Preset {
            description: Some("Create a 160 pixel high thumbnail of the first page.".to_string()),
            pages: PageSpec::list(&[1]),
            height: SizeChange::ChangeTo(160),
            overwrite: true,
            ..Preset::default()
        },
    );

    presets.insert(
        "first-last".to_string(),
        Preset {
            description: Some("Combine the first and last pages horizontally.".to_string()),
            pages: PageSpec::list(&[1, -1]),
            combine: vec![CombineSpec::horizontal(1, -1)],
            overwrite: true,
            ..Preset::default()
        },
    );

    presets.insert(
        "box".to_string(),
        Preset {
            description: Some(
                "Extract pages 1-7 downscaled to 1080 pixels high, combine pages 4-7 in a box \
                 layout and save each file as PNG named after its page number."
                    .to_string(),
            ),
            pages: PageSpec::range(1, 7),
            height: SizeChange::Downscale(1080),
            combine: vec![
                CombineSpec::new(Direction::Horizontal, 4, 5),
                CombineSpec::new(Direction::Horizontal, 6, 7),
                CombineSpec::new(Direction::Vertical, 4, 6),
            ],
            resample: ResampleFilter::Bicubic,
            format: Some(OutputFormat::Png),
            overwrite: true,
            name_template: NameTemplate::parse("{archive}-Page-{page}").ok(),
            keep_archive_paths: false,
            ..Preset::default()
        },
    );

    presets
}

// ============================================================
// Config file
// ============================================================

/// Contents of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preset used when `--preset` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_preset: Option<String>,
    /// User presets; they shadow built-ins of the same name
    pub presets: BTreeMap<String, Preset>,
}

impl Config {
    /// Load from the first discovered location, or defaults
    pub fn load() -> Result<Self> {
        for path in Self::search_paths() {
            if !path.is_file() {
                continue;
            }
            return match Self::load_from_path(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    Ok(config)
                }
                Err(e) => {
                    warn!("Ignoring config file: {}", e);
                    Ok(Self::default())
                }
            };
        }
        Ok(Self::default())
    }

    /// Load from an explicit path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Discovery locations, in priority order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(USER_CONFIG_DIR).join("config.toml"));
        }
        paths
    }

    /// Look up a preset by name, falling back to the built-ins
    pub fn preset(&self, name: &str) -> Result<Preset> {
        if let Some(preset) = self.presets.get(name) {
            return Ok(preset.clone());
        }
        builtin_presets()
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }

    /// Name of the preset to use when none is requested
    pub fn default_preset_name(&self) -> &str {
        self.default_preset.as_deref().unwrap_or(DEFAULT_PRESET)
    }

    /// Every available preset, user presets shadowing built-ins
    pub fn all_presets(&self) -> BTreeMap<String, Preset> {
        let mut presets = builtin_presets();
        presets.extend(self.presets.clone());
        presets
    }

    /// Resolve a preset and merge CLI overrides on top
    pub fn merge_with_cli(&self, preset: Option<&str>, cli: &CliOverrides) -> Result<RunConfig> {
        let name = preset.unwrap_or_else(|| self.default_preset_name());
        Ok(self.preset(name)?.merge_with_cli(name, cli))
    }
}

// ============================================================
// CLI overrides
// ============================================================

/// Options given on the command line; `None` keeps the preset's value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pages: Option<PageSpec>,
    pub sort_method: Option<SortMethod>,
    pub sort_order: Option<SortOrder>,
    pub width: Option<SizeChange>,
    pub height: Option<SizeChange>,
    pub keep_aspect_ratio: Option<bool>,
    pub rotate: Option<RotateSpec>,
    pub combine: Vec<CombineSpec>,
    pub resample: Option<ResampleFilter>,
    pub format: Option<OutputFormat>,
    pub search_sub_dirs: Option<bool>,
    pub overwrite: Option<bool>,
    pub name_template: Option<NameTemplate>,
    pub save_dirs: Vec<PathBuf>,
    pub keep_archive_paths: Option<bool>,
    pub default_root: Option<PathBuf>,
    pub create_log: Option<bool>,
    pub log_path: Option<PathBuf>,
    pub json_report: Option<PathBuf>,
    pub temp_root: Option<PathBuf>,
}

impl CliOverrides {
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================
// Run configuration
// ============================================================

/// Fully resolved options for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub preset: String,
    pub description: Option<String>,
    pub pages: PageSpec,
    pub sort: PageSort,
    pub search_sub_dirs: bool,
    pub edit: EditOptions,
    pub save: SaveOptions,
    /// Text log destination, `None` when logging is off
    pub log_path: Option<PathBuf>,
    pub json_report: Option<PathBuf>,
    /// Parent for temporary extraction directories
    pub temp_root: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Preset::default().merge_with_cli(DEFAULT_PRESET, &CliOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_spec::PageNumber;
    use std::io::Write;

    #[test]
    fn test_builtin_presets() {
        let presets = builtin_presets();
        assert_eq!(presets.len(), 4);

        let thumb = &presets["thumbnail"];
        assert_eq!(thumb.height, SizeChange::ChangeTo(160));
        assert!(thumb.overwrite);

        let boxed = &presets["box"];
        assert_eq!(boxed.combine.len(), 3);
        assert_eq!(boxed.combine[2], CombineSpec::vertical(4, 6));
        assert_eq!(boxed.format, Some(OutputFormat::Png));
        assert!(!boxed.keep_archive_paths);
        assert_eq!(
            boxed.name_template.as_ref().map(ToString::to_string),
            Some("{archive}-Page-{page}".to_string())
        );
    }

    #[test]
    fn test_parse_full_preset() {
        let config = Config::from_toml(
            r#"
default_preset = "mine"

[presets.mine]
description = "Test preset"
pages = [1, 4, "5", -1]
sort = { method = "alpha-number", order = "descending" }
width = "50%"
height = { mode = "downscale", value = 1080 }
keep_aspect_ratio = false
rotate = { all = 180, pages = { "1" = 90 } }
combine = [{ direction = "vertical", a = 1, b = 4 }]
resample = "bicubic"
format = "png"
search_sub_dirs = true
overwrite = true
name_template = "{archive}-{counter}"
save_dirs = ["out/a", "out/b"]
keep_archive_paths = false
default_root = "/tmp/comics"
create_log = false
"#,
        )
        .unwrap();

        assert_eq!(config.default_preset_name(), "mine");
        let preset = config.preset("mine").unwrap();
        assert_eq!(
            preset.pages,
            PageSpec::List(vec![
                PageNumber::Number(1),
                PageNumber::Number(4),
                PageNumber::Disabled("5".into()),
                PageNumber::Number(-1),
            ])
        );
        assert_eq!(preset.sort, PageSort::new(SortMethod::AlphaNumber, SortOrder::Descending));
        assert_eq!(preset.width, SizeChange::ModifyByPercent(50.0));
        assert_eq!(preset.height, SizeChange::Downscale(1080));
        assert_eq!(preset.rotate.all_angle(), Some(180.0));
        assert_eq!(preset.resample, ResampleFilter::Bicubic);
        assert_eq!(preset.save_dirs.len(), 2);
        assert!(preset.search_sub_dirs);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config = Config::from_toml("[presets.bare]\n").unwrap();
        let preset = config.preset("bare").unwrap();
        assert_eq!(preset, Preset::default());
        assert!(preset.keep_archive_paths);
        assert!(preset.create_log);
    }

    #[test]
    fn test_invalid_config() {
        assert!(Config::from_toml("[presets.x]\nname_template = \"{nope}\"\n").is_err());
        assert!(Config::from_toml("[presets.x]\nresample = \"lanczos\"\n").is_err());
    }

    #[test]
    fn test_user_preset_shadows_builtin() {
        let config = Config::from_toml("[presets.thumbnail]\nheight = 320\n").unwrap();
        assert_eq!(config.preset("thumbnail").unwrap().height, SizeChange::ChangeTo(320));
        assert_eq!(config.all_presets().len(), 4);
    }

    #[test]
    fn test_unknown_preset() {
        let err = Config::default().preset("nope").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPreset(name) if name == "nope"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[presets.x]\noverwrite = true").unwrap();
        let config = Config::load_from_path(file.path()).unwrap();
        assert!(config.preset("x").unwrap().overwrite);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "presets = 3").unwrap();
        assert!(matches!(
            Config::load_from_path(bad.path()),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            Config::load_from_path(Path::new("/nonexistent/config.toml")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_merge_with_cli() {
        let overrides = CliOverrides {
            pages: Some(PageSpec::range(2, 3)),
            overwrite: Some(false),
            save_dirs: vec![PathBuf::from("elsewhere")],
            default_root: Some(PathBuf::from("/data")),
            ..CliOverrides::new()
        };
        let run = Config::default()
            .merge_with_cli(Some("thumbnail"), &overrides)
            .unwrap();

        assert_eq!(run.preset, "thumbnail");
        assert_eq!(run.pages, PageSpec::range(2, 3));
        assert_eq!(run.edit.height, SizeChange::ChangeTo(160));
        assert!(!run.save.overwrite);
        assert_eq!(run.save.save_dirs, vec![PathBuf::from("elsewhere")]);
        assert_eq!(run.log_path, Some(PathBuf::from("/data").join(DEFAULT_LOG_NAME)));
    }

    #[test]
    fn test_log_disabled() {
        let overrides = CliOverrides {
            create_log: Some(false),
            ..CliOverrides::new()
        };
        let run = Config::default().merge_with_cli(None, &overrides).unwrap();
        assert_eq!(run.preset, DEFAULT_PRESET);
        assert!(run.log_path.is_none());
    }
}
