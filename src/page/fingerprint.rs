//! Platform identification from response headers

use reqwest::header::{HeaderMap, SERVER, SET_COOKIE};

/// Header value fragments and the platform they reveal
const SERVER_SIGNATURES: &[(&str, &str)] = &[
    ("nginx", "nginx"),
    ("apache", "apache"),
    ("microsoft-iis", "iis"),
    ("jetty", "jetty"),
    ("tomcat", "tomcat"),
    ("gunicorn", "python"),
];

const POWERED_BY_SIGNATURES: &[(&str, &str)] = &[
    ("php", "php"),
    ("asp.net", "asp.net"),
    ("express", "nodejs"),
    ("servlet", "java"),
    ("jsp", "java"),
];

const SESSION_COOKIES: &[(&str, &str)] = &[
    ("phpsessid", "php"),
    ("jsessionid", "java"),
    ("asp.net_sessionid", "asp.net"),
    ("aspsessionid", "asp"),
    ("connect.sid", "nodejs"),
];

/// Identifies platforms from a response's headers
///
/// Returns a sorted, duplicate-free list of platform names.
pub fn identify(headers: &HeaderMap) -> Vec<String> {
    let mut platforms = Vec::new();

    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    };

    if let Some(server) = header_str(SERVER.as_str()) {
        collect(&server, SERVER_SIGNATURES, &mut platforms);
    }

    if let Some(powered_by) = header_str("x-powered-by") {
        collect(&powered_by, POWERED_BY_SIGNATURES, &mut platforms);
    }

    if header_str("x-aspnet-version").is_some() {
        platforms.push("asp.net".to_string());
    }

    for cookie in headers.get_all(SET_COOKIE) {
        if let Ok(cookie) = cookie.to_str() {
            let name = cookie
                .split('=')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            collect_exact(&name, SESSION_COOKIES, &mut platforms);
        }
    }

    platforms.sort();
    platforms.dedup();
    platforms
}

fn collect(value: &str, signatures: &[(&str, &str)], platforms: &mut Vec<String>) {
    for (needle, platform) in signatures {
        if value.contains(needle) {
            platforms.push(platform.to_string());
        }
    }
}

fn collect_exact(value: &str, signatures: &[(&str, &str)], platforms: &mut Vec<String>) {
    for (name, platform) in signatures {
        if value == *name {
            platforms.push(platform.to_string());
        }
    }
}
