// URL resolution, validation, normalization and classification.
//
// Everything a crawl touches arrives here first: raw hrefs scraped from
// untrusted pages, possibly relative, possibly hostile. `UrlResolver::resolve`
// turns such a string into an immutable `UrlDescriptor` or a typed
// `UrlRejection` - rejection is a plain branch for the caller, never an error
// crossing the crawl boundary.

use crate::suffix::{self, DomainParts};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;
use tracing::trace;
use url::Url;

/// Classification of a URL relative to the crawl's base registrable domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UrlKind {
    /// Same registrable domain as the crawl scope.
    Internal,
    /// Different registrable domain.
    External,
    /// Non-document resource (image, stylesheet, archive, ...). Takes
    /// precedence over internal/external.
    Asset,
    /// No crawl scope established yet.
    Unknown,
}

/// Why a URL was rejected. First failing check wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("scheme not in allow-list")]
    BadScheme,
    #[error("missing or forbidden authority")]
    BadAuthority,
    #[error("port out of range")]
    BadPort,
    #[error("path traversal escapes the root")]
    PathTraversal,
    #[error("denylist pattern matched")]
    DenylistMatch,
    #[error("path or query exceeds length bounds")]
    Oversize,
    #[error("malformed reference")]
    Malformed,
}

/// A rejected URL together with its typed reason.
#[derive(Debug, Clone, Error)]
#[error("rejected {raw:?}: {reason}")]
pub struct UrlRejection {
    pub raw: String,
    pub reason: RejectReason,
}

/// Validation and normalization policy. The denylist and the suffix table are
/// data, not logic: both ship with defaults and both are fully replaceable.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    /// Schemes accepted during validation. Everything else is `BadScheme`.
    pub allowed_schemes: Vec<String>,
    /// Permit embedded credentials (`user:pass@host`). Off by default.
    pub allow_credentials: bool,
    /// Permit loopback/private/link-local hosts. Off by default (SSRF defense);
    /// tests against local mock servers turn this on.
    pub allow_private_hosts: bool,
    pub max_path_len: usize,
    pub max_query_len: usize,
    /// Injection patterns scanned against the decoded path+query. A match is a
    /// hard rejection, never silent stripping.
    pub denylist: Vec<Regex>,
    /// Path extensions classified as `UrlKind::Asset`.
    pub asset_extensions: Vec<String>,
    /// When true, query pairs are serialized in sorted order inside the
    /// normalized form, so URLs differing only in query order dedupe together.
    pub sort_query: bool,
    /// Multi-part public suffix table; `None` means suffix data is
    /// unavailable and decomposition falls back to a flagged heuristic.
    pub public_suffixes: Option<Vec<String>>,
}

const DEFAULT_DENYLIST: &[&str] = &[
    r"(?i)<\s*script",
    r"(?i)javascript\s*:",
    r"(?i)\bon(?:click|error|load|mouseover)\s*=",
    r"(?i)\bunion\b[\s/*]+select\b",
    r"(?i)\bdrop\s+table\b",
    r"(?i)'\s*or\s+'?1'?\s*=\s*'?1",
    r"(?i)(?:;|\|\||&&)\s*(?:rm|cat|curl|wget|nc)\b",
    r"\$\(",
    "`",
];

const DEFAULT_ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "css", "js", "mjs", "map", "woff",
    "woff2", "ttf", "otf", "eot", "mp3", "mp4", "webm", "avi", "mov", "pdf", "zip", "tar", "gz",
    "tgz", "bz2", "xz", "7z", "rar", "exe", "dmg", "iso", "bin", "wasm",
];

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            allow_credentials: false,
            allow_private_hosts: false,
            max_path_len: 2048,
            max_query_len: 4096,
            denylist: DEFAULT_DENYLIST
                .iter()
                .map(|p| Regex::new(p).expect("built-in denylist pattern is valid"))
                .collect(),
            asset_extensions: DEFAULT_ASSET_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            sort_query: false,
            public_suffixes: Some(suffix::builtin_suffixes()),
        }
    }
}

/// An immutable descriptor for a resolved, validated and normalized URL.
/// Derived fields are computed once at construction; `normalized` is the
/// canonical form used for dedupe comparisons.
#[derive(Debug, Clone)]
pub struct UrlDescriptor {
    /// The input exactly as it was handed to `resolve`.
    pub raw: String,
    /// The resolved absolute URL (fragment already stripped).
    pub url: Url,
    /// Canonical string form: lowercase scheme/host, IDNA-encoded host,
    /// default ports dropped, dot segments collapsed, no fragment.
    pub normalized: String,
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    /// Ordered query mapping; repeated keys preserved, nothing deduped.
    pub query_pairs: Vec<(String, String)>,
    pub domain: DomainParts,
    pub kind: UrlKind,
}

impl UrlDescriptor {
    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Per-crawl URL resolver: a policy plus the crawl's base registrable domain
/// once it is known. Immutable during the crawl itself, so workers share it
/// without locking.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    policy: UrlPolicy,
    scope: Option<String>,
}

impl UrlResolver {
    pub fn new(policy: UrlPolicy) -> Self {
        Self {
            policy,
            scope: None,
        }
    }

    /// Sets the crawl's base registrable domain; later resolutions classify
    /// against it.
    pub fn set_scope(&mut self, registrable: impl Into<String>) {
        self.scope = Some(registrable.into());
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn policy(&self) -> &UrlPolicy {
        &self.policy
    }

    /// Resolves `raw` (relative to `base` when given), then validates,
    /// normalizes, decomposes and classifies it.
    ///
    /// Validation is ordered and the first failure wins: control bytes,
    /// reference parsing, scheme allow-list, authority, port, credentials,
    /// private-host (SSRF), length bounds, unresolved `..` traversal,
    /// decoded denylist scan.
    pub fn resolve(&self, raw: &str, base: Option<&Url>) -> Result<UrlDescriptor, UrlRejection> {
        let reject = |reason: RejectReason| UrlRejection {
            raw: raw.to_string(),
            reason,
        };

        if raw.is_empty() || raw.chars().any(|c| c.is_control()) {
            return Err(reject(RejectReason::Malformed));
        }

        let resolved = match base {
            Some(base) => base.join(raw),
            None => Url::parse(raw),
        }
        .map_err(|e| {
            reject(match e {
                url::ParseError::InvalidPort => RejectReason::BadPort,
                url::ParseError::EmptyHost
                | url::ParseError::InvalidDomainCharacter
                | url::ParseError::InvalidIpv4Address
                | url::ParseError::InvalidIpv6Address => RejectReason::BadAuthority,
                _ => RejectReason::Malformed,
            })
        })?;

        let scheme = resolved.scheme().to_string();
        if !self.policy.allowed_schemes.iter().any(|s| s == &scheme) {
            return Err(reject(RejectReason::BadScheme));
        }

        let host = match resolved.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(reject(RejectReason::BadAuthority)),
        };

        if !self.policy.allow_credentials
            && (!resolved.username().is_empty() || resolved.password().is_some())
        {
            return Err(reject(RejectReason::BadAuthority));
        }

        if !self.policy.allow_private_hosts && is_private_host(&host) {
            return Err(reject(RejectReason::BadAuthority));
        }

        let path = resolved.path().to_string();
        let query = resolved.query().unwrap_or("");
        if path.len() > self.policy.max_path_len {
            return Err(reject(RejectReason::Oversize));
        }
        if query.len() > self.policy.max_query_len {
            return Err(reject(RejectReason::Oversize));
        }

        // Traversal safety is judged on the reference as written, before the
        // parser collapses dot segments: a merge that pops past the root is a
        // hard rejection even though `Url` would silently clamp it.
        match traversal_escapes(raw, base) {
            Ok(false) => {}
            Ok(true) => return Err(reject(RejectReason::PathTraversal)),
            Err(()) => return Err(reject(RejectReason::Malformed)),
        }

        let decoded_path = percent_decode(&path).ok_or_else(|| reject(RejectReason::Malformed))?;
        let decoded_query = percent_decode(query).ok_or_else(|| reject(RejectReason::Malformed))?;
        let scan_target = format!("{decoded_path}?{decoded_query}");
        for pattern in &self.policy.denylist {
            if pattern.is_match(&scan_target) {
                trace!(url = raw, pattern = pattern.as_str(), "denylist rejection");
                return Err(reject(RejectReason::DenylistMatch));
            }
        }

        // Normalization. The url crate already lowercased the scheme,
        // IDNA-encoded and lowercased the host, dropped default ports and
        // collapsed residual dot segments; what remains is dropping the
        // fragment and optionally canonicalizing query order.
        let mut canon = resolved.clone();
        canon.set_fragment(None);
        if self.policy.sort_query {
            let mut pairs: Vec<(String, String)> = canon.query_pairs().into_owned().collect();
            pairs.sort();
            if pairs.is_empty() {
                canon.set_query(None);
            } else {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in &pairs {
                    serializer.append_pair(key, value);
                }
                let sorted = serializer.finish();
                canon.set_query(Some(&sorted));
            }
        }
        let normalized = canon.to_string();

        let query_pairs: Vec<(String, String)> = canon.query_pairs().into_owned().collect();
        let domain = suffix::decompose(&host, self.policy.public_suffixes.as_deref());
        let kind = self.classify(&path, &domain);

        Ok(UrlDescriptor {
            raw: raw.to_string(),
            port: canon.port(),
            path: canon.path().to_string(),
            url: canon,
            normalized,
            scheme,
            host,
            query_pairs,
            domain,
            kind,
        })
    }

    fn classify(&self, path: &str, domain: &DomainParts) -> UrlKind {
        if let Some(ext) = path_extension(path) {
            let ext = ext.to_ascii_lowercase();
            if self.policy.asset_extensions.iter().any(|e| e == &ext) {
                return UrlKind::Asset;
            }
        }
        match &self.scope {
            None => UrlKind::Unknown,
            Some(scope) if scope.eq_ignore_ascii_case(&domain.registrable) => UrlKind::Internal,
            Some(_) => UrlKind::External,
        }
    }
}

fn path_extension(path: &str) -> Option<&str> {
    let file = path.rsplit('/').next().unwrap_or("");
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// Loopback, RFC 1918, link-local, unspecified and `.localhost`/`.local`
/// hosts are refused unless the policy allows them.
fn is_private_host(host: &str) -> bool {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.eq_ignore_ascii_case("localhost")
        || bare.to_ascii_lowercase().ends_with(".localhost")
        || bare.to_ascii_lowercase().ends_with(".local")
    {
        return true;
    }
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => {
                v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
            }
            IpAddr::V6(v6) => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (v6.segments()[0] & 0xffc0) == 0xfe80
                    || (v6.segments()[0] & 0xfe00) == 0xfc00
            }
        };
    }
    false
}

/// Checks whether the reference, merged against `base` per RFC 3986 but
/// before dot-segment collapse, pops `..` past the root. `%2e`-encoded dots
/// count; a malformed percent escape is `Err`.
fn traversal_escapes(raw: &str, base: Option<&Url>) -> Result<bool, ()> {
    // The WHATWG parser treats `\` as `/` in http(s) URLs; mirror that here
    // so `..\..\` merges the same way the parser merges it.
    let raw = raw.replace('\\', "/");
    let reference = reference_path(&raw);
    let decoded = percent_decode(reference).ok_or(())?;

    let mut stack: Vec<&str> = Vec::new();
    let base_dir = match base {
        Some(base) if !decoded.starts_with('/') => {
            let base_path = base.path();
            match base_path.rfind('/') {
                Some(idx) => &base_path[..=idx],
                None => "/",
            }
        }
        _ => "",
    };
    for segment in base_dir.split('/') {
        if !segment.is_empty() && segment != "." {
            stack.push(segment);
        }
    }

    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Ok(true);
                }
            }
            other => stack.push(other),
        }
    }
    Ok(false)
}

/// Extracts the path portion of a reference as written: scheme/authority
/// stripped when present, query and fragment dropped.
fn reference_path(raw: &str) -> &str {
    let trimmed = raw.split(['?', '#']).next().unwrap_or("");
    let rest = if let Some(idx) = trimmed.find("://") {
        &trimmed[idx + 3..]
    } else if let Some(stripped) = trimmed.strip_prefix("//") {
        stripped
    } else {
        return trimmed;
    };
    match rest.find('/') {
        Some(idx) => &rest[idx..],
        None => "",
    }
}

/// Decodes percent escapes for segment analysis and denylist scanning.
/// `None` only for malformed escapes; escapes that decode to non-UTF-8
/// bytes are replaced lossily, since the callers need scannable text out of
/// a valid URL, not byte fidelity.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() {
                return None;
            }
            let hi = hex_value(bytes[i + 1])?;
            let lo = hex_value(bytes[i + 2])?;
            out.push(hi * 16 + lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(String::from_utf8_lossy(&out).into_owned())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_decode_plain() {
        assert_eq!(percent_decode("/docs/page").as_deref(), Some("/docs/page"));
        assert_eq!(percent_decode("%2e%2e/x").as_deref(), Some("../x"));
    }

    #[test]
    fn test_percent_decode_malformed() {
        assert_eq!(percent_decode("/a%2"), None);
        assert_eq!(percent_decode("/a%zz"), None);
    }

    #[test]
    fn test_percent_decode_non_utf8_is_lossy_not_rejected() {
        let decoded = percent_decode("/a%FFb").unwrap();
        assert!(decoded.starts_with("/a"));
        assert!(decoded.ends_with('b'));
    }

    #[test]
    fn test_reference_path_forms() {
        assert_eq!(reference_path("https://example.com/a/b?q=1#f"), "/a/b");
        assert_eq!(reference_path("//example.com/a"), "/a");
        assert_eq!(reference_path("../images/logo.png"), "../images/logo.png");
        assert_eq!(reference_path("https://example.com"), "");
    }

    #[test]
    fn test_traversal_escape_detection() {
        let base = Url::parse("https://example.com/docs/page.html").unwrap();
        assert_eq!(traversal_escapes("../images/logo.png", Some(&base)), Ok(false));
        assert_eq!(traversal_escapes("../../x", Some(&base)), Ok(true));
        assert_eq!(
            traversal_escapes("https://example.com/../../etc/passwd", None),
            Ok(true)
        );
        assert_eq!(traversal_escapes("%2e%2e/%2e%2e/x", Some(&base)), Ok(true));
    }

    #[test]
    fn test_backslash_separators_count_as_segments() {
        // The WHATWG parser turns `\` into `/` for http(s), so the merge
        // analysis has to see those segments too.
        let base = Url::parse("https://example.com/docs/page.html").unwrap();
        assert_eq!(traversal_escapes(r"..\..\..\x", Some(&base)), Ok(true));
        assert_eq!(
            traversal_escapes(r"https://example.com\..\..\etc\passwd", None),
            Ok(true)
        );
        assert_eq!(traversal_escapes(r"..\images\logo.png", Some(&base)), Ok(false));
    }

    #[test]
    fn test_private_host_detection() {
        assert!(is_private_host("localhost"));
        assert!(is_private_host("127.0.0.1"));
        assert!(is_private_host("10.1.2.3"));
        assert!(is_private_host("192.168.0.1"));
        assert!(is_private_host("169.254.1.1"));
        assert!(is_private_host("[::1]"));
        assert!(is_private_host("internal.local"));
        assert!(!is_private_host("example.com"));
        assert!(!is_private_host("8.8.8.8"));
    }

    #[test]
    fn test_path_extension() {
        assert_eq!(path_extension("/img/logo.png"), Some("png"));
        assert_eq!(path_extension("/docs/page"), None);
        assert_eq!(path_extension("/docs/.hidden"), None);
        assert_eq!(path_extension("/docs/page."), None);
    }
}
