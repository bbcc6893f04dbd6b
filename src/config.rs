// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::exception::Exception;

/// 优先加载的本地配置文件名
pub const LOCAL_CONFIG_FILE: &str = "config.local.toml";
/// 默认配置文件名
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_environment")]
    environment: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_root")]
    root: String,
    #[serde(default = "default_locale")]
    default_locale: String,
    /// 可用语言表：语言代码 -> 区域设置
    #[serde(default)]
    locale: BTreeMap<String, String>,
    /// 原始配置树，供点号路径查询
    #[serde(skip)]
    data: toml::Table,
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_local() -> bool {
    true
}

fn default_root() -> String {
    ".".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            environment: default_environment(),
            port: default_port(),
            local: default_local(),
            worker_threads: num_cpus::get(),
            root: default_root(),
            default_locale: default_locale(),
            locale: BTreeMap::new(),
            data: toml::Table::new(),
        }
    }

    /// 从目录加载配置：`config.local.toml` 存在时优先使用，否则读取 `config.toml`。
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, Exception> {
        let dir = dir.as_ref();
        let local = dir.join(LOCAL_CONFIG_FILE);
        let path = if local.is_file() {
            info!("使用本地配置文件 {}", local.display());
            local
        } else {
            dir.join(CONFIG_FILE)
        };
        let text = fs::read_to_string(&path)
            .map_err(|e| Exception::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, Exception> {
        let data: toml::Table =
            toml::from_str(text).map_err(|e| Exception::Config(e.to_string()))?;
        let mut config: Config = toml::Value::Table(data.clone())
            .try_into()
            .map_err(|e: toml::de::Error| Exception::Config(e.to_string()))?;
        config.data = data;

        if config.worker_threads == 0 {
            config.worker_threads = num_cpus::get();
            debug!("worker_threads 未设置，使用 CPU 核心数 {}", config.worker_threads);
        }
        if config.environment.is_empty() {
            warn!("environment 为空，按非生产环境处理");
        }
        Ok(config)
    }

    /// 按点号路径查询原始配置，例如 `database.host`。
    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        let mut parts = key.split('.');
        let mut value = self.data.get(parts.next()?)?;
        for part in parts {
            value = value.as_table()?.get(part)?;
        }
        Some(value)
    }

    /// 按点号路径查询字符串值，不存在或不是字符串时返回 `default`
    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).and_then(|v| v.as_str()).unwrap_or(default)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// 只有 `environment = "prod"` 才视为生产环境
    pub fn is_prod(&self) -> bool {
        self.environment == "prod"
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// `[locale]` 表，未配置时为空
    pub fn locales(&self) -> &BTreeMap<String, String> {
        &self.locale
    }
}
