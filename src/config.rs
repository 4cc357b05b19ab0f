use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Blogs registered at startup (refreshed on demand, not polled).
    #[serde(default)]
    pub blogs: Vec<BlogSeed>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlogSeed {
    pub name: String,
    pub url: String,
    pub rss_url: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            blogs: Vec::new(),
        }
    }
}
