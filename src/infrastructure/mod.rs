pub mod http_transport;
pub mod proxy;
pub mod reqwest_transport;

pub use http_transport::{
    HttpResponse, HttpTransport, RequestBody, RequestOptions, TransportFactory, TransportSettings,
};
pub use proxy::{parse_proxy_list, ProxyConfig, ProxyParseError, ProxyProtocol};
pub use reqwest_transport::{ReqwestTransport, ReqwestTransportFactory};
