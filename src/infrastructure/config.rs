use crate::domain::config::{ModemConfig, PhonebookEntry};
use crate::domain::error::{ModemError, ModemResult};
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;
use tracing::debug;

const CONFIG_DIR: &str = ".modemcom";
const CONFIG_FILE: &str = "config.toml";

/// Loads the layered configuration: built-in defaults, then the global
/// file, then the project file. Later layers override keys of earlier ones;
/// arrays such as the phonebook are replaced as a whole.
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> ModemResult<Self> {
        let global_config_path = Self::default_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager over explicit paths
    pub fn with_paths(global_config_path: PathBuf, project_config_path: Option<PathBuf>) -> Self {
        Self {
            global_config_path,
            project_config_path,
        }
    }

    pub fn load_config(&self) -> ModemResult<ModemConfig> {
        let mut merged = Value::Table(Default::default());

        for path in self.layers() {
            debug!("Loading configuration layer {}", path.display());
            merge(&mut merged, read_value(path)?);
        }

        merged.try_into::<ModemConfig>().map_err(|e| ModemError::Config {
            message: format!("Invalid configuration: {}", e),
        })
    }

    /// Load a single file on its own, ignoring the layered locations
    pub fn load_config_from_path(&self, path: &Path) -> ModemResult<ModemConfig> {
        let content = fs::read_to_string(path).map_err(|e| ModemError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        toml::from_str(&content).map_err(|e| ModemError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }

    pub fn save_config_to_path(&self, path: &Path, config: &ModemConfig) -> ModemResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| ModemError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ModemError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        fs::write(path, content).map_err(|e| ModemError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Write a starter project configuration under `path/.modemcom`
    pub fn init_project_config(&self, path: &Path) -> ModemResult<PathBuf> {
        let config_file = path.join(CONFIG_DIR).join(CONFIG_FILE);

        if config_file.exists() {
            return Err(ModemError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        self.save_config_to_path(&config_file, &sample_config())?;
        Ok(config_file)
    }

    /// Existing configuration files in load order
    pub fn layers(&self) -> Vec<&Path> {
        std::iter::once(self.global_config_path.as_path())
            .chain(self.project_config_path.as_deref())
            .filter(|path| path.exists())
            .collect()
    }

    pub fn project_config_path(&self) -> Option<&Path> {
        self.project_config_path.as_deref()
    }

    pub fn global_config_path(&self) -> &Path {
        &self.global_config_path
    }

    fn default_global_config_path() -> ModemResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| ModemError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("modemcom").join(CONFIG_FILE))
    }

    /// Walk up from the working directory looking for `.modemcom/config.toml`
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }
}

fn read_value(path: &Path) -> ModemResult<Value> {
    let content = fs::read_to_string(path).map_err(|e| ModemError::Config {
        message: format!("Failed to read config file {}: {}", path.display(), e),
    })?;

    content.parse::<Value>().map_err(|e| ModemError::Config {
        message: format!("Failed to parse config file {}: {}", path.display(), e),
    })
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn sample_config() -> ModemConfig {
    let mut config = ModemConfig::default();

    for cue in ["dialtone", "busy", "modem_noise", "connect_success", "connect_failed"] {
        config
            .sounds
            .insert(cue.to_string(), PathBuf::from(format!("sounds/{}.wav", cue)));
    }
    for digit in 0..=9 {
        config.sounds.insert(
            format!("tone_{}", digit),
            PathBuf::from(format!("sounds/tone_{}.wav", digit)),
        );
    }

    config.phonebook = vec![
        PhonebookEntry::new("555-1234").with_route("localhost:2323"),
        PhonebookEntry::new("555-0000").with_announce("busy"),
    ];
    config
}
