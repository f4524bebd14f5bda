use std::{fs::File, path::{Path, PathBuf}};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::horizontal::GridMethod;

/// Filesystem surface of one pipeline stage in one mode.
#[derive(Debug, Clone, Deserialize)]
pub struct StagePaths {
    /// Directory receiving the stage's rotated log files.
    pub log_path: PathBuf,
    /// Publish root; outputs land under `<save_path>/<yyyymmdd>/`.
    pub save_path: PathBuf,
    /// Directory holding the stage's persistent sets.
    pub preset_path: PathBuf,
    /// Staging directory for the atomic-rename publish step.
    #[serde(default)]
    pub buffer_path: Option<PathBuf>,
}

/// Operational and test variants of a stage.
#[derive(Debug, Clone, Deserialize)]
pub struct StageModes {
    pub oper: StagePaths,
    pub test: StagePaths,
}

/// The gridding stage additionally selects its scatter-to-grid method.
#[derive(Debug, Clone, Deserialize)]
pub struct MkgrdConfig {
    pub oper: StagePaths,
    pub test: StagePaths,
    #[serde(default)]
    pub method: GridMethod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveConfig {
    pub log_path: PathBuf,
    #[serde(default = "default_retention")]
    pub retention_days: u32,
}

fn default_retention() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub send_host: String,
    pub account: String,
    pub password: String,
    pub receive_address: String,
}

/// Process-wide pipeline configuration, loaded once at start.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Root of the raw station file tree, organized as `<root>/<yyyymmdd>/`.
    pub data_source: PathBuf,
    pub parse: StageModes,
    pub mkgrd: MkgrdConfig,
    pub shear: StageModes,
    pub remove: RemoveConfig,
    /// Root of the missing-slot reports.
    pub report_path: PathBuf,
    #[serde(default)]
    pub email: Option<EmailConfig>,
}

impl Config {
    fn validate(self) -> Result<Self> {
        if self.data_source.as_os_str().is_empty() {
            return Err(Error::ConfigInvalid("data_source is empty".to_string()));
        }
        for (stage, paths) in [
            ("mkgrd.oper", &self.mkgrd.oper),
            ("mkgrd.test", &self.mkgrd.test),
            ("shear.oper", &self.shear.oper),
            ("shear.test", &self.shear.test),
        ] {
            if paths.buffer_path.is_none() {
                return Err(Error::ConfigInvalid(format!(
                    "{stage} publishes cubes and needs a buffer_path"
                )));
            }
        }
        Ok(self)
    }

    pub fn with_path(fpath: &Path) -> Result<Config> {
        let fin = File::open(fpath)?;
        let config: Config = serde_yaml::from_reader(fin)?;
        config.validate()
    }

    pub fn with_data(dat: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(dat)?;
        config.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
data_source: /data/RADR/WPRD/ROBS
parse:
  oper:
    log_path: /opr/parse/log
    save_path: /opr/parse/out
    preset_path: /opr/parse/preset
  test:
    log_path: /test/parse/log
    save_path: /test/parse/out
    preset_path: /test/parse/preset
mkgrd:
  method: linear
  oper:
    log_path: /opr/mkgrd/log
    save_path: /opr/mkgrd/out
    preset_path: /opr/mkgrd/preset
    buffer_path: /opr/mkgrd/buffer
  test:
    log_path: /test/mkgrd/log
    save_path: /test/mkgrd/out
    preset_path: /test/mkgrd/preset
    buffer_path: /test/mkgrd/buffer
shear:
  oper:
    log_path: /opr/shear/log
    save_path: /opr/shear/out
    preset_path: /opr/shear/preset
    buffer_path: /opr/shear/buffer
  test:
    log_path: /test/shear/log
    save_path: /test/shear/out
    preset_path: /test/shear/preset
    buffer_path: /test/shear/buffer
remove:
  log_path: /opr/remove/log
report_path: /opr/inspect
email:
  send_host: smtp.example.com
  account: monitor@example.com
  password: hunter2
  receive_address: debugger@example.com
";

    #[test]
    fn loads_and_validates() {
        let config = Config::with_data(SAMPLE).unwrap();
        assert_eq!(config.remove.retention_days, 3);
        assert_eq!(config.mkgrd.method, GridMethod::Linear);
        assert!(config.email.is_some());
        assert_eq!(
            config.mkgrd.oper.buffer_path.as_deref(),
            Some(Path::new("/opr/mkgrd/buffer"))
        );
    }

    #[test]
    fn method_defaults_to_linear() {
        let trimmed = SAMPLE.replace("  method: linear\n", "");
        let config = Config::with_data(&trimmed).unwrap();
        assert_eq!(config.mkgrd.method, GridMethod::Linear);
    }

    #[test]
    fn missing_buffer_path_is_invalid() {
        let broken = SAMPLE.replace("    buffer_path: /opr/shear/buffer\n", "");
        let err = Config::with_data(&broken).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
    }

    #[test]
    fn email_is_optional() {
        let end = SAMPLE.find("email:").unwrap();
        let config = Config::with_data(&SAMPLE[..end]).unwrap();
        assert!(config.email.is_none());
    }

    #[test]
    fn unknown_method_is_rejected() {
        let broken = SAMPLE.replace("method: linear", "method: bicubic");
        assert!(Config::with_data(&broken).is_err());
    }
}
