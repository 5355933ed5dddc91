use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use core::str;
use log::{error, warn};
use std::fs::File;
use std::io::prelude::*;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    worker_threads: usize,
    local: bool,
    #[serde(default = "default_shell_path")]
    shell_path: String,
    #[serde(default = "default_assets_root")]
    assets_root: String,
    #[serde(default = "default_render_cache_ttl_secs")]
    render_cache_ttl_secs: u64,
    #[serde(default = "default_render_cache_capacity")]
    render_cache_capacity: usize,
}

fn default_shell_path() -> String {
    crate::param::HTML_SHELL.to_string()
}

fn default_assets_root() -> String {
    "static".to_string()
}

fn default_render_cache_ttl_secs() -> u64 {
    60 // 普通页面的默认缓存窗口：1分钟
}

fn default_render_cache_capacity() -> usize {
    4096 // 条目上限只是内存兜底，正常淘汰依赖TTL
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 7878,
            worker_threads: 0,
            local: true,
            shell_path: default_shell_path(),
            assets_root: default_assets_root(),
            render_cache_ttl_secs: default_render_cache_ttl_secs(),
            render_cache_capacity: default_render_cache_capacity(),
        }
    }

    pub fn from_toml(filename: &str) -> Self {
        let mut file = match File::open(filename) {
            Ok(f) => f,
            Err(e) => panic!("no such file {} exception:{}", filename, e),
        };
        let mut str_val = String::new();
        match file.read_to_string(&mut str_val) {
            Ok(s) => s,
            Err(e) => panic!("Error Reading file: {}", e),
        };

        let mut raw_config: Config = match toml::from_str(&str_val) {
            Ok(t) => t,
            Err(_) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置");
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.render_cache_capacity == 0 {
            warn!("render_cache_capacity被设置为0，但目前尚不支持禁用渲染缓存，因此该值将被改为默认值。");
            raw_config.render_cache_capacity = default_render_cache_capacity();
        }
        if raw_config.render_cache_ttl_secs == 0 {
            warn!("render_cache_ttl_secs被设置为0，这会使普通页面的缓存立即过期，因此该值将被改为默认值。");
            raw_config.render_cache_ttl_secs = default_render_cache_ttl_secs();
        }
        raw_config
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn shell_path(&self) -> &str {
        &self.shell_path
    }

    pub fn assets_root(&self) -> &str {
        &self.assets_root
    }

    pub fn render_cache_ttl_secs(&self) -> u64 {
        self.render_cache_ttl_secs
    }

    pub fn render_cache_capacity(&self) -> usize {
        self.render_cache_capacity
    }
}
