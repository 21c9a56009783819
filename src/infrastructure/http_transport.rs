//! HTTP 传输抽象 - 基础设施层
//!
//! 流水线只依赖 `HttpTransport` 提供的 get / post 能力，
//! 代理和超时属于传输设置，在打开传输时一次性指定。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::TransportError;
use crate::infrastructure::ProxyConfig;

/// HTTP 响应（任何状态码都视为有效响应）
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 以 UTF-8 解码响应体（非法字节替换）
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// 请求体
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// application/x-www-form-urlencoded
    Form(Vec<(String, String)>),
    /// application/json
    Json(JsonValue),
}

/// 单次请求选项
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    /// false 时 3xx 原样返回
    pub follow_redirects: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            follow_redirects: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// 打开传输时的设置
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// 单次请求超时
    pub timeout: Duration,
    /// 自动跟随的最大重定向次数
    pub max_redirects: usize,
    pub proxy: Option<ProxyConfig>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 5,
            proxy: None,
        }
    }
}

/// HTTP 传输能力
///
/// 一个实例对应一个会话（共享 cookie），流水线每次重试都会打开新的实例。
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse, TransportError>;

    async fn post(
        &self,
        url: &str,
        body: &RequestBody,
        options: &RequestOptions,
    ) -> Result<HttpResponse, TransportError>;
}

/// 按设置创建传输会话
pub trait TransportFactory: Send + Sync {
    fn open(&self, settings: &TransportSettings) -> Result<Arc<dyn HttpTransport>, TransportError>;
}
