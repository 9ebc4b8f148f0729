// src/config.rs
use std::time::Duration;

use lazy_static::lazy_static;

use crate::error::ConfigError;
use crate::memory::{MemoryModel, PagedMemory, SectoredMemory};

pub const DEFAULT_START_UNIT: u16 = 4;
pub const DEFAULT_PAGE_COUNT: u16 = 32; // 128 bytes on NTAG215
pub const DEFAULT_BLOCK_COUNT: u16 = 16;
pub const DEFAULT_AUTH_KEY: [u8; 6] = [0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7];
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
pub const DEFAULT_WS_PORT: u16 = 3500;

// Reader pseudo-APDUs address units with a single byte
const MAX_UNIT: u32 = 0xFF;

lazy_static! {
    pub static ref CONFIG: Result<TagConfig, ConfigError> = TagConfig::from_env();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagConfig {
    pub memory: MemoryModel,
    pub language: String,
    pub poll_interval: Duration,
    pub reader_filter: Option<String>,
    pub ws_port: u16,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            memory: MemoryModel::Paged(PagedMemory::new(DEFAULT_START_UNIT, DEFAULT_PAGE_COUNT)),
            language: DEFAULT_LANGUAGE.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            reader_filter: None,
            ws_port: DEFAULT_WS_PORT,
        }
    }
}

impl TagConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let start_unit = match get("JUKEBOX_TAG_START_UNIT") {
            Some(v) => parse_number::<u16>("JUKEBOX_TAG_START_UNIT", &v)?,
            None => DEFAULT_START_UNIT,
        };
        let unit_count = match get("JUKEBOX_TAG_UNIT_COUNT") {
            Some(v) => Some(parse_number::<u16>("JUKEBOX_TAG_UNIT_COUNT", &v)?),
            None => None,
        };

        let memory = match get("JUKEBOX_TAG_MEMORY").as_deref() {
            None | Some("paged") => {
                let count = unit_count.unwrap_or(DEFAULT_PAGE_COUNT);
                check_range("JUKEBOX_TAG_UNIT_COUNT", start_unit, count)?;
                MemoryModel::Paged(PagedMemory::new(start_unit, count))
            }
            Some("sectored") => {
                let count = unit_count.unwrap_or(DEFAULT_BLOCK_COUNT);
                check_range("JUKEBOX_TAG_UNIT_COUNT", start_unit, count)?;
                let auth_key = match get("JUKEBOX_TAG_AUTH_KEY") {
                    Some(v) => parse_key(&v)?,
                    None => DEFAULT_AUTH_KEY,
                };
                let memory = SectoredMemory::new(start_unit, count, auth_key);
                if memory.data_blocks().is_empty() {
                    return Err(ConfigError::invalid(
                        "JUKEBOX_TAG_UNIT_COUNT",
                        "range holds only sector trailers",
                    ));
                }
                MemoryModel::Sectored(memory)
            }
            Some(other) => {
                return Err(ConfigError::invalid(
                    "JUKEBOX_TAG_MEMORY",
                    format!("expected `paged` or `sectored`, got `{}`", other),
                ));
            }
        };

        let language = get("JUKEBOX_TAG_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.into());
        if !language.is_ascii() || language.len() > 63 {
            return Err(ConfigError::invalid(
                "JUKEBOX_TAG_LANGUAGE",
                "must be ASCII and at most 63 bytes",
            ));
        }

        let poll_ms = match get("JUKEBOX_POLL_INTERVAL_MS") {
            Some(v) => parse_number::<u64>("JUKEBOX_POLL_INTERVAL_MS", &v)?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        let ws_port = match get("JUKEBOX_WS_PORT") {
            Some(v) => parse_number::<u16>("JUKEBOX_WS_PORT", &v)?,
            None => DEFAULT_WS_PORT,
        };

        Ok(Self {
            memory,
            language,
            poll_interval: Duration::from_millis(poll_ms),
            reader_filter: get("JUKEBOX_READER"),
            ws_port,
        })
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(var, format!("`{}`: {}", value, e)))
}

fn check_range(var: &'static str, start: u16, count: u16) -> Result<(), ConfigError> {
    if count == 0 {
        return Err(ConfigError::invalid(var, "unit count must be positive"));
    }
    let last = start as u32 + count as u32 - 1;
    if last > MAX_UNIT {
        return Err(ConfigError::invalid(
            var,
            format!("range ends at unit {}, beyond {}", last, MAX_UNIT),
        ));
    }
    Ok(())
}

fn parse_key(value: &str) -> Result<[u8; 6], ConfigError> {
    let bytes = hex::decode(value)
        .map_err(|e| ConfigError::invalid("JUKEBOX_TAG_AUTH_KEY", e.to_string()))?;
    <[u8; 6]>::try_from(bytes.as_slice()).map_err(|_| {
        ConfigError::invalid(
            "JUKEBOX_TAG_AUTH_KEY",
            format!("expected 6 bytes, got {}", bytes.len()),
        )
    })
}
