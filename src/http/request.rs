//! Request helpers
//!
//! 反向代理之后的 URL 还原：scheme 取自转发头，端口与路径前缀取自 `ProxyConfig`。

use std::str::FromStr;

use http::uri::Authority;
use http::{header, Request, Uri};
use thiserror::Error;

use crate::config::ProxyConfig;

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("request has no host")]
    MissingHost,

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("failed to build url: {0}")]
    Invalid(#[from] http::Error),
}

/// 代理对外暴露的 base URL，path 为配置的前缀
pub fn proxy_base_url<B>(request: &Request<B>, proxy: &ProxyConfig) -> Result<Uri, UrlError> {
    build_url(request, proxy, &normalize_prefix(&proxy.prefix))
}

/// base URL 拼接请求的 path 与 query
pub fn proxy_url_full<B>(request: &Request<B>, proxy: &ProxyConfig) -> Result<Uri, UrlError> {
    let mut path = join_path(&proxy.prefix, request.uri().path());
    if let Some(query) = request.uri().query() {
        path.push('?');
        path.push_str(query);
    }
    build_url(request, proxy, &path)
}

/// 转发头声明的协议是否为 https
pub fn is_secure<B>(request: &Request<B>, proxy: &ProxyConfig) -> bool {
    forwarded_proto(request, proxy).is_some_and(|proto| proto.starts_with("https"))
}

fn build_url<B>(
    request: &Request<B>,
    proxy: &ProxyConfig,
    path_and_query: &str,
) -> Result<Uri, UrlError> {
    let scheme = forwarded_proto(request, proxy).unwrap_or("http");
    let authority = external_authority(request, proxy.port)?;

    Ok(Uri::builder()
        .scheme(scheme)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()?)
}

fn forwarded_proto<'r, B>(request: &'r Request<B>, proxy: &ProxyConfig) -> Option<&'r str> {
    request
        .headers()
        .get(proxy.forwarded_proto_header.as_str())
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|proto| !proto.is_empty())
}

/// Host 头优先，其次是请求 URI 的 authority；配置了端口时替换原端口
fn external_authority<B>(request: &Request<B>, port: Option<u16>) -> Result<Authority, UrlError> {
    let raw = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .ok_or(UrlError::MissingHost)?;

    let authority =
        Authority::from_str(&raw).map_err(|_| UrlError::InvalidHost(raw.clone()))?;

    match port {
        Some(port) => {
            // IPv6 的 host() 已包含方括号
            let replaced = format!("{}:{}", authority.host(), port);
            Authority::from_str(&replaced).map_err(|_| UrlError::InvalidHost(replaced))
        }
        None => Ok(authority),
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{}", path),
        (false, true) => format!("/{}", prefix),
        (false, false) => format!("/{}/{}", prefix, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxy(port: Option<u16>, prefix: &str) -> ProxyConfig {
        ProxyConfig {
            port,
            prefix: prefix.to_string(),
            ..ProxyConfig::default()
        }
    }

    fn request(uri: &str, host: &str) -> Request<()> {
        Request::builder()
            .uri(uri)
            .header(header::HOST, host)
            .body(())
            .unwrap()
    }

    #[test]
    fn test_base_url_defaults_to_http() {
        let req = request("/items/1", "example.com");
        let url = proxy_base_url(&req, &ProxyConfig::default()).unwrap();
        assert_eq!(url.to_string(), "http://example.com/");
    }

    #[test]
    fn test_base_url_with_forwarded_proto_port_and_prefix() {
        let req = Request::builder()
            .uri("/items/1")
            .header(header::HOST, "example.com:8080")
            .header("X-Forwarded-Proto", "https")
            .body(())
            .unwrap();

        let url = proxy_base_url(&req, &proxy(Some(8443), "/api/")).unwrap();
        assert_eq!(url.to_string(), "https://example.com:8443/api");
    }

    #[test]
    fn test_full_url_keeps_path_and_query() {
        let req = request("/items/1?expand=true", "example.com");
        let url = proxy_url_full(&req, &proxy(None, "/shop")).unwrap();
        assert_eq!(url.to_string(), "http://example.com/shop/items/1?expand=true");
    }

    #[test]
    fn test_full_url_without_prefix() {
        let req = request("/whoami", "localhost:5060");
        let url = proxy_url_full(&req, &ProxyConfig::default()).unwrap();
        assert_eq!(url.to_string(), "http://localhost:5060/whoami");
    }

    #[test]
    fn test_ipv6_host_port_override() {
        let req = request("/", "[::1]:3000");
        let url = proxy_base_url(&req, &proxy(Some(80), "")).unwrap();
        assert_eq!(url.authority().unwrap().as_str(), "[::1]:80");
    }

    #[test]
    fn test_custom_forwarded_header() {
        let config = ProxyConfig {
            forwarded_proto_header: "X-Scheme".to_string(),
            ..ProxyConfig::default()
        };
        let req = Request::builder()
            .uri("/")
            .header(header::HOST, "example.com")
            .header("X-Scheme", "https")
            .body(())
            .unwrap();

        assert!(is_secure(&req, &config));
        assert!(!is_secure(&req, &ProxyConfig::default()));
    }

    #[test]
    fn test_is_secure() {
        let secure = Request::builder()
            .header("X-Forwarded-Proto", "https")
            .body(())
            .unwrap();
        let plain = Request::builder()
            .header("X-Forwarded-Proto", "http")
            .body(())
            .unwrap();

        assert!(is_secure(&secure, &ProxyConfig::default()));
        assert!(!is_secure(&plain, &ProxyConfig::default()));
        assert!(!is_secure(&Request::new(()), &ProxyConfig::default()));
    }

    #[test]
    fn test_missing_host() {
        let req = Request::builder().uri("/").body(()).unwrap();
        let err = proxy_base_url(&req, &ProxyConfig::default()).unwrap_err();
        assert!(matches!(err, UrlError::MissingHost));
    }

    #[test]
    fn test_uri_authority_fallback() {
        let req = Request::builder()
            .uri("http://internal:9000/x")
            .body(())
            .unwrap();
        let url = proxy_base_url(&req, &ProxyConfig::default()).unwrap();
        assert_eq!(url.to_string(), "http://internal:9000/");
    }
}
