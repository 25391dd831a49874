use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::percent_decode_str;
use url::Url;

/// Builds a Basic `Authorization` header value
///
/// # Examples
///
/// ```
/// use linkprobe::url::basic_auth;
///
/// assert_eq!(basic_auth("Aladdin", "open sesame"), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
/// ```
pub fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Basic credentials embedded in the URL itself (`http://user:pw@host/`)
///
/// The user-info is percent-decoded before encoding. Returns `None` when the
/// URL carries no user-info.
pub fn userinfo_auth(url: &Url) -> Option<String> {
    if url.username().is_empty() && url.password().is_none() {
        return None;
    }

    let user = percent_decode_str(url.username()).decode_utf8_lossy();
    let password = url
        .password()
        .map(|p| percent_decode_str(p).decode_utf8_lossy())
        .unwrap_or_default();
    Some(basic_auth(&user, &password))
}
