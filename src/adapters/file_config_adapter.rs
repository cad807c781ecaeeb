//! INI file configuration adapter.

use crate::domain::error::MeridianError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MeridianError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| MeridianError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, MeridianError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| MeridianError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, MeridianError> {
        self.config
            .getint(section, key)
            .map_err(|reason| MeridianError::config_invalid(section, key, reason))
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, MeridianError> {
        self.config
            .getfloat(section, key)
            .map_err(|reason| MeridianError::config_invalid(section, key, reason))
    }

    fn get_bool(&self, section: &str, key: &str) -> Result<Option<bool>, MeridianError> {
        match self.config.get(section, key) {
            None => Ok(None),
            Some(value) => Self::parse_bool(&value).map(Some).ok_or_else(|| {
                MeridianError::config_invalid(
                    section,
                    key,
                    format!("expected true/false, got {:?}", value),
                )
            }),
        }
    }
}
