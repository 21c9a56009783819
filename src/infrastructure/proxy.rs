//! 代理配置与代理列表解析

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 代理协议
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    #[default]
    Http,
    Https,
}

impl ProxyProtocol {
    pub fn scheme(self) -> &'static str {
        match self {
            ProxyProtocol::Http => "http",
            ProxyProtocol::Https => "https",
        }
    }

    fn from_scheme(s: &str) -> Self {
        if s.eq_ignore_ascii_case("https") {
            ProxyProtocol::Https
        } else {
            ProxyProtocol::Http
        }
    }
}

/// 单个代理 (host, port, protocol)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: ProxyProtocol,
}

impl ProxyConfig {
    pub fn new(host: impl Into<String>, port: u16, protocol: ProxyProtocol) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// 代理地址，例如 `http://10.0.0.1:8080`
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol.scheme(), self.host, self.port)
    }
}

impl fmt::Display for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// 代理格式错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyParseError {
    #[error("无效的代理格式: {line}")]
    InvalidFormat { line: String },
    #[error("代理正则表达式无效: {0}")]
    Pattern(String),
}

fn proxy_pattern() -> Result<&'static Regex, ProxyParseError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    // host:port | http(s)://host:port | http(s) host:port
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^(?:(?:(?P<scheme>https?)://)?(?P<host>[\w.-]+):(?P<port>\d+)|(?P<scheme2>https?)\s+(?P<host2>[\w.-]+):(?P<port2>\d+))$",
            )
        })
        .as_ref()
        .map_err(|e| ProxyParseError::Pattern(e.to_string()))
}

impl FromStr for ProxyConfig {
    type Err = ProxyParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let invalid = || ProxyParseError::InvalidFormat {
            line: line.to_string(),
        };

        let caps = proxy_pattern()?.captures(line).ok_or_else(invalid)?;

        let scheme = caps.name("scheme").or_else(|| caps.name("scheme2"));
        let host = caps
            .name("host")
            .or_else(|| caps.name("host2"))
            .ok_or_else(invalid)?;
        let port = caps
            .name("port")
            .or_else(|| caps.name("port2"))
            .ok_or_else(invalid)?
            .as_str()
            .parse::<u16>()
            .map_err(|_| invalid())?;

        Ok(ProxyConfig {
            host: host.as_str().to_string(),
            port,
            protocol: scheme
                .map(|m| ProxyProtocol::from_scheme(m.as_str()))
                .unwrap_or_default(),
        })
    }
}

/// 解析代理列表：每行一个，空行忽略，遇到第一条无效行即返回错误
pub fn parse_proxy_list(text: &str) -> Result<Vec<ProxyConfig>, ProxyParseError> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ProxyConfig::from_str)
        .collect()
}
