//! Physical HTTP requests
//!
//! One logical check issues a sequence of physical requests. Each one is
//! described by a [`PhysicalRequest`] (built from the check state) and handed
//! to a [`RequestExecutor`], which opens a fresh connection, sends it and
//! returns status line and headers. The body is only read when asked for.

use crate::checker::CheckContext;
use crate::state::{Method, UrlCheckState};
use crate::storage::CookieStore;
use crate::url::{host_with_port, is_http_scheme, userinfo_auth, ProxyConfig};
use crate::{CheckError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, PROXY_AUTHORIZATION};
use reqwest::{redirect::Policy, Client, Proxy};
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

/// Value of the `Accept-Encoding` header sent with every request
pub const ACCEPT_ENCODING: &str = "gzip;q=1.0, deflate;q=0.9, identity;q=0.5";

/// One request as it goes on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalRequest {
    pub method: Method,
    /// Target URL without user-info (and without fragment when suppressed)
    pub url: Url,
    pub proxy: Option<ProxyConfig>,
    /// Ordered header list; names may repeat (one `Cookie` per cookie)
    pub headers: Vec<(String, String)>,
    pub read_body: bool,
}

impl PhysicalRequest {
    /// Plain GET used for auxiliary documents such as robots.txt
    pub fn fetch(url: Url, user_agent: &str, proxy: Option<ProxyConfig>) -> Self {
        let mut headers = vec![
            ("Host".to_string(), host_with_port(&url)),
            ("User-Agent".to_string(), user_agent.to_string()),
        ];
        if let Some(auth) = proxy.as_ref().and_then(|p| p.authorization.clone()) {
            headers.push(("Proxy-Authorization".to_string(), auth));
        }
        Self {
            method: Method::Get,
            url,
            proxy,
            headers,
            read_body: true,
        }
    }

    /// First value of a header (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header, in order
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// Status line, headers and (optionally) body of a response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`; the server's own text is not
    /// available from the HTTP client
    pub reason: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl RawResponse {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Redirect target from `Location`, or the legacy `Uri` header
    ///
    /// Raw UTF-8 bytes are decoded lossily; joining the target against the
    /// current URL percent-encodes them.
    pub fn location(&self) -> Option<String> {
        self.headers
            .get(LOCATION)
            .or_else(|| self.headers.get("uri"))
            .map(|v| match v.to_str() {
                Ok(s) => s.to_string(),
                Err(_) => String::from_utf8_lossy(v.as_bytes()).into_owned(),
            })
    }

    /// `"200 OK"` style summary of the status line
    pub fn status_line(&self) -> String {
        format!("{} {}", self.status, self.reason).trim_end().to_string()
    }
}

/// Sends one physical request
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &PhysicalRequest) -> Result<RawResponse>;
}

/// Builds the next physical request from the check state
///
/// Records the cookies sent in `state.cookies` when a cookie store is given.
pub fn build_request(
    state: &mut UrlCheckState,
    user_agent: &str,
    cookies: Option<&dyn CookieStore>,
) -> PhysicalRequest {
    let url = state.request_url();
    let mut headers = vec![("Host".to_string(), host_with_port(&url))];

    // user-info in the URL wins over credentials obtained after a 401
    if let Some(auth) = userinfo_auth(&url).or_else(|| state.auth.clone()) {
        headers.push(("Authorization".to_string(), auth));
    }
    if let Some(auth) = state.proxy.as_ref().and_then(|p| p.authorization.clone()) {
        headers.push(("Proxy-Authorization".to_string(), auth));
    }
    if let Some(parent) = &state.parent_url {
        headers.push(("Referer".to_string(), parent.clone()));
    }
    headers.push(("User-Agent".to_string(), user_agent.to_string()));
    headers.push(("Accept-Encoding".to_string(), ACCEPT_ENCODING.to_string()));

    if let Some(store) = cookies {
        state.cookies = store.get(&host_with_port(&url), url.path());
        for cookie in &state.cookies {
            headers.push(("Cookie".to_string(), cookie.clone()));
        }
    }

    let mut wire_url = url;
    // Credentials travel in the Authorization header only
    let _ = wire_url.set_username("");
    let _ = wire_url.set_password(None);

    PhysicalRequest {
        method: state.method,
        url: wire_url,
        proxy: state.proxy.clone(),
        headers,
        read_body: false,
    }
}

/// Builds and sends the next request for `state`, recording the response headers
pub(crate) async fn send(ctx: &CheckContext, state: &mut UrlCheckState) -> Result<RawResponse> {
    send_with(ctx, state, false).await
}

pub(crate) async fn send_with(
    ctx: &CheckContext,
    state: &mut UrlCheckState,
    read_body: bool,
) -> Result<RawResponse> {
    let cookies = ctx.config.checker.cookies.then(|| &*ctx.cookies);
    let mut request = build_request(state, &ctx.user_agent, cookies);
    request.read_body = read_body;

    tracing::debug!("{} {} (proxy: {:?})", request.method, request.url, request.proxy);
    let response = ctx.executor.execute(&request).await?;
    tracing::debug!(
        "{} {} -> {} {:?}",
        request.method,
        request.url,
        response.status_line(),
        response.headers
    );

    state.headers = Some(response.headers.clone());
    Ok(response)
}

/// reqwest-backed executor opening a fresh connection per request
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    timeout: Duration,
    connect_timeout: Duration,
    verbose: bool,
}

impl HttpExecutor {
    pub fn new(timeout: Duration, connect_timeout: Duration, verbose: bool) -> Self {
        Self {
            timeout,
            connect_timeout,
            verbose,
        }
    }

    fn client(&self, proxy: Option<&ProxyConfig>) -> std::result::Result<Client, reqwest::Error> {
        let builder = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(Policy::none()) // Redirects are followed by the check itself
            .pool_max_idle_per_host(0)
            .connection_verbose(self.verbose);

        let builder = match proxy {
            Some(proxy) => {
                let mut p = Proxy::all(proxy.url())?;
                if let Some(auth) = proxy
                    .authorization
                    .as_deref()
                    .and_then(|a| HeaderValue::from_str(a).ok())
                {
                    p = p.custom_http_auth(auth);
                }
                builder.proxy(p)
            }
            None => builder.no_proxy(),
        };

        builder.build()
    }
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(10), false)
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &PhysicalRequest) -> Result<RawResponse> {
        if !is_http_scheme(request.url.scheme()) {
            return Err(CheckError::Protocol {
                scheme: request.url.scheme().to_string(),
            });
        }

        let url = request.url.to_string();
        let client = self
            .client(request.proxy.as_ref())
            .map_err(|source| CheckError::Connection {
                url: url.clone(),
                source,
            })?;

        let response = client
            .request(request.method.into(), request.url.clone())
            .headers(header_map(&request.headers))
            .send()
            .await
            .map_err(|e| classify_transport_error(&url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = if request.read_body && request.method == Method::Get {
            Some(
                response
                    .bytes()
                    .await
                    .map_err(|e| classify_transport_error(&url, e))?,
            )
        } else {
            None
        };

        Ok(RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}

/// End-to-end headers for the origin server
///
/// `Proxy-Authorization` is hop-by-hop: the client's proxy settings add it to
/// forwarded requests and to the CONNECT of an https tunnel, so it must not
/// travel inside the tunnel to the origin.
fn header_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(PROXY_AUTHORIZATION.as_str()) {
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => tracing::warn!("Dropping invalid request header {}", name),
        }
    }
    map
}

/// Separates unparseable responses from other transport failures
///
/// Servers that answer HEAD with an empty or garbled status line surface as
/// hyper parse or incomplete-message errors somewhere in the source chain.
fn classify_transport_error(url: &str, error: reqwest::Error) -> CheckError {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>() {
            if hyper_err.is_parse() || hyper_err.is_incomplete_message() {
                return CheckError::MalformedResponse {
                    url: url.to_string(),
                    message: hyper_err.to_string(),
                };
            }
        }
        source = err.source();
    }

    CheckError::Connection {
        url: url.to_string(),
        source: error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::JarCookieStore;
    use crate::url::basic_auth;
    use reqwest::header::SET_COOKIE;

    const UA: &str = "TestProbe/1.0 (+https://example.com/about; admin@example.com)";

    fn state(url: &str) -> UrlCheckState {
        UrlCheckState::new(Url::parse(url).unwrap(), None)
    }

    #[test]
    fn test_request_headers_in_order() {
        let mut s = state("http://example.com:8080/page?q=1");
        s.parent_url = Some("http://example.com/index.html".to_string());
        let request = build_request(&mut s, UA, None);

        let names: Vec<&str> = request.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Host", "Referer", "User-Agent", "Accept-Encoding"]);
        assert_eq!(request.header("host"), Some("example.com:8080"));
        assert_eq!(request.header("Accept-Encoding"), Some(ACCEPT_ENCODING));
        assert_eq!(request.method, Method::Head);
        assert!(!request.read_body);
    }

    #[test]
    fn test_userinfo_takes_precedence_over_session_auth() {
        let mut s = state("http://joe:pw@example.com/");
        s.auth = Some(basic_auth("other", "secret"));
        let request = build_request(&mut s, UA, None);

        assert_eq!(request.header("Authorization"), Some(basic_auth("joe", "pw").as_str()));
        assert_eq!(request.url.as_str(), "http://example.com/");
    }

    #[test]
    fn test_session_auth_used_without_userinfo() {
        let mut s = state("http://example.com/");
        s.auth = Some(basic_auth("alice", "secret"));
        let request = build_request(&mut s, UA, None);
        assert_eq!(
            request.header("Authorization"),
            Some(basic_auth("alice", "secret").as_str())
        );
    }

    #[test]
    fn test_proxy_authorization_header() {
        let mut s = state("http://example.com/");
        s.proxy = Some(ProxyConfig::parse("http://p:q@proxy.local:3128").unwrap());
        let request = build_request(&mut s, UA, None);

        assert_eq!(
            request.header("Proxy-Authorization"),
            Some(basic_auth("p", "q").as_str())
        );
        assert_eq!(request.proxy.as_ref().unwrap().address, "proxy.local:3128");
        assert_eq!(request.header("Host"), Some("example.com"));
    }

    #[test]
    fn test_proxy_authorization_not_sent_end_to_end() {
        let mut s = state("https://secure.example/");
        s.proxy = Some(ProxyConfig::parse("http://p:q@proxy.local:3128").unwrap());
        let request = build_request(&mut s, UA, None);
        assert!(request.header("Proxy-Authorization").is_some());

        let wire = header_map(&request.headers);
        assert!(wire.get(PROXY_AUTHORIZATION).is_none());
        assert_eq!(wire.get("host").unwrap(), "secure.example");
        assert_eq!(wire.get("user-agent").unwrap(), UA);
    }

    #[test]
    fn test_fragment_stripped_when_suppressed() {
        let mut s = state("http://example.com/page#frag");
        assert_eq!(build_request(&mut s, UA, None).url.fragment(), Some("frag"));

        s.strip_anchor();
        assert_eq!(build_request(&mut s, UA, None).url.fragment(), None);
    }

    #[test]
    fn test_one_cookie_header_per_cookie() {
        let store = JarCookieStore::new();
        let mut set = HeaderMap::new();
        set.append(SET_COOKIE, HeaderValue::from_static("a=1; Path=/"));
        set.append(SET_COOKIE, HeaderValue::from_static("b=2; Path=/"));
        store.store(&set, "example.com");

        let mut s = state("http://example.com/x");
        let request = build_request(&mut s, UA, Some(&store));

        let mut cookies = request.header_values("Cookie");
        cookies.sort();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(s.cookies.len(), 2);
    }

    #[test]
    fn test_location_falls_back_to_uri_header() {
        let mut response = RawResponse::new(302, "Found");
        response
            .headers
            .insert("uri", HeaderValue::from_static("/elsewhere"));
        assert_eq!(response.location().as_deref(), Some("/elsewhere"));

        response
            .headers
            .insert(LOCATION, HeaderValue::from_static("/preferred"));
        assert_eq!(response.location().as_deref(), Some("/preferred"));
    }

    #[test]
    fn test_location_with_raw_utf8_bytes() {
        let mut response = RawResponse::new(301, "Moved Permanently");
        response.headers.insert(
            LOCATION,
            HeaderValue::from_bytes("/caf\u{e9}".as_bytes()).unwrap(),
        );
        assert_eq!(response.location().as_deref(), Some("/caf\u{e9}"));
    }

    #[test]
    fn test_status_line() {
        assert_eq!(RawResponse::new(204, "No Content").status_line(), "204 No Content");
        assert_eq!(RawResponse::new(299, "").status_line(), "299");
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_protocol_error() {
        let executor = HttpExecutor::default();
        let request = PhysicalRequest::fetch(
            Url::parse("ftp://example.com/file").unwrap(),
            UA,
            None,
        );
        let result = executor.execute(&request).await;
        assert!(matches!(result, Err(CheckError::Protocol { ref scheme }) if scheme == "ftp"));
    }
}
