//! INI file configuration adapter.
//!
//! Section and key names are case-insensitive; `[symbol.GOOG]` and
//! `[symbol.goog]` are the same section. Unparseable numbers and booleans
//! fall back to the caller's default, as if the key were absent.

use std::path::Path;
use std::str::FromStr;

use configparser::ini::Ini;

use crate::domain::error::ArimaTraderError;
use crate::ports::config_port::ConfigPort;

pub struct FileConfigAdapter {
    ini: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArimaTraderError> {
        let path = path.as_ref();
        Self::parse(&path.display().to_string(), |ini| ini.load(path).map(drop))
    }

    pub fn from_string(content: &str) -> Result<Self, ArimaTraderError> {
        Self::parse("<string>", |ini| ini.read(content.to_string()).map(drop))
    }

    fn parse(
        origin: &str,
        fill: impl FnOnce(&mut Ini) -> Result<(), String>,
    ) -> Result<Self, ArimaTraderError> {
        let mut ini = Ini::new();
        fill(&mut ini).map_err(|reason| ArimaTraderError::ConfigParse {
            file: origin.to_string(),
            reason,
        })?;
        Ok(Self { ini })
    }

    fn parsed<T: FromStr>(&self, section: &str, key: &str) -> Option<T> {
        self.ini.get(section, key)?.trim().parse().ok()
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.ini.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.parsed(section, key).unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        let Some(raw) = self.ini.get(section, key) else {
            return default;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => true,
            "false" | "no" | "off" | "0" => false,
            _ => default,
        }
    }
}
