//! 基于 reqwest 的传输实现

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, RequestBuilder};
use tracing::debug;

use crate::error::TransportError;
use crate::infrastructure::http_transport::{
    HttpResponse, HttpTransport, RequestBody, RequestOptions, TransportFactory, TransportSettings,
};

/// reqwest 传输
///
/// 持有两个共享同一 cookie jar 的客户端：一个跟随重定向，一个不跟随。
pub struct ReqwestTransport {
    following: Client,
    manual: Client,
}

impl ReqwestTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let jar = Arc::new(Jar::default());

        let following = Self::builder(settings, jar.clone())?
            .redirect(Policy::limited(settings.max_redirects))
            .build()?;
        let manual = Self::builder(settings, jar)?
            .redirect(Policy::none())
            .build()?;

        Ok(Self { following, manual })
    }

    fn builder(settings: &TransportSettings, jar: Arc<Jar>) -> Result<ClientBuilder, TransportError> {
        let mut builder = Client::builder()
            .timeout(settings.timeout)
            .cookie_provider(jar);

        if let Some(proxy) = &settings.proxy {
            debug!("使用代理: {}", proxy);
            let proxy = reqwest::Proxy::all(proxy.url())
                .map_err(|e| TransportError::InvalidRequest(format!("代理无效 {}: {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder)
    }

    fn client(&self, options: &RequestOptions) -> &Client {
        if options.follow_redirects {
            &self.following
        } else {
            &self.manual
        }
    }

    async fn send(
        &self,
        mut request: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse, TransportError> {
        debug!("GET {}", url);
        self.send(self.client(options).get(url), options).await
    }

    async fn post(
        &self,
        url: &str,
        body: &RequestBody,
        options: &RequestOptions,
    ) -> Result<HttpResponse, TransportError> {
        debug!("POST {}", url);
        let request = self.client(options).post(url);
        let request = match body {
            RequestBody::Form(fields) => request.form(fields),
            RequestBody::Json(value) => request.json(value),
        };
        self.send(request, options).await
    }
}

/// 生产环境使用的传输工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestTransportFactory;

impl TransportFactory for ReqwestTransportFactory {
    fn open(&self, settings: &TransportSettings) -> Result<Arc<dyn HttpTransport>, TransportError> {
        Ok(Arc::new(ReqwestTransport::new(settings)?))
    }
}

/// 拼接完整的错误链（reqwest 的顶层信息通常不含 DNS / TLS 细节）
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = error_chain(&err);
        if err.is_timeout() {
            TransportError::Timeout(message)
        } else if err.is_connect() {
            TransportError::Connect(message)
        } else if err.is_builder() {
            TransportError::InvalidRequest(message)
        } else {
            TransportError::Other(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{ProxyConfig, ProxyProtocol};
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_error_status_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&TransportSettings::default()).unwrap();
        let response = transport
            .get(&format!("{}/missing", server.uri()), &RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.text(), "nope");
    }

    #[tokio::test]
    async fn test_redirect_not_followed_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/form"))
            .and(header("referer", "https://site.example/form"))
            .and(body_string_contains("adres=phish.example"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/thanks"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&TransportSettings::default()).unwrap();
        let body = RequestBody::Form(vec![("adres".to_string(), "phish.example".to_string())]);
        let options = RequestOptions::new()
            .header("Referer", "https://site.example/form")
            .no_redirects();

        let response = transport
            .post(&format!("{}/form", server.uri()), &body, &options)
            .await
            .unwrap();

        assert_eq!(response.status, 302);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let settings = TransportSettings {
            timeout: Duration::from_millis(50),
            ..TransportSettings::default()
        };
        let transport = ReqwestTransport::new(&settings).unwrap();
        let err = transport
            .get(&server.uri(), &RequestOptions::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[test]
    fn test_factory_accepts_proxy_settings() {
        let settings = TransportSettings {
            proxy: Some(ProxyConfig::new("127.0.0.1", 3128, ProxyProtocol::Http)),
            ..TransportSettings::default()
        };
        assert!(ReqwestTransportFactory.open(&settings).is_ok());
    }
}
