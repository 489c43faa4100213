use {
    anyhow::{Context as _, Result, format_err},
    derivative::Derivative,
    fs_err as fs,
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
    tdstore_sdk::key_data::DEFAULT_DATA_NAME,
};

#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
pub struct Config {
    /// Directory holding the records, usually `tdata`.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Version written into new records; newer records are rejected.
    pub app_version: i32,
    #[serde(default = "default_data_name")]
    pub data_name: String,
    /// Used instead of prompting when set.
    #[derivative(Debug = "ignore")]
    #[serde(default)]
    pub passcode: Option<String>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_data_name() -> String {
    DEFAULT_DATA_NAME.into()
}

fn default_log_filter() -> String {
    "info".into()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        json5::from_str(&text).with_context(|| format!("failed to parse config {path:?}"))
    }

    pub fn base_path(&self) -> Result<&Path> {
        self.base_path
            .as_deref()
            .ok_or_else(|| format_err!("`base_path` is not set in config or command line"))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| format_err!("cannot find config dir"))?;
    Ok(config_dir.join("tdstore.json5"))
}
