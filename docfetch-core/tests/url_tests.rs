// Tests for URL resolution, validation, normalization and classification

use docfetch_core::url::{RejectReason, UrlKind, UrlPolicy, UrlResolver};
use url::Url;

fn resolver() -> UrlResolver {
    UrlResolver::new(UrlPolicy::default())
}

fn scoped_resolver(registrable: &str) -> UrlResolver {
    let mut r = resolver();
    r.set_scope(registrable);
    r
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_absolute_url_resolves() {
    let desc = resolver().resolve("https://example.com/docs/", None).unwrap();
    assert_eq!(desc.scheme, "https");
    assert_eq!(desc.host, "example.com");
    assert_eq!(desc.path, "/docs/");
}

#[test]
fn test_relative_reference_resolves_against_base() {
    let base = Url::parse("https://example.com/docs/page.html").unwrap();
    let desc = resolver()
        .resolve("../images/logo.png", Some(&base))
        .unwrap();
    assert_eq!(desc.normalized, "https://example.com/images/logo.png");
}

#[test]
fn test_relative_without_base_is_malformed() {
    let err = resolver().resolve("docs/page.html", None).unwrap_err();
    assert_eq!(err.reason, RejectReason::Malformed);
}

#[test]
fn test_protocol_relative_resolves() {
    let base = Url::parse("https://example.com/docs/").unwrap();
    let desc = resolver().resolve("//cdn.example.com/a", Some(&base)).unwrap();
    assert_eq!(desc.host, "cdn.example.com");
    assert_eq!(desc.scheme, "https");
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_javascript_scheme_rejected() {
    let err = resolver().resolve("javascript:alert(1)", None).unwrap_err();
    assert_eq!(err.reason, RejectReason::BadScheme);
}

#[test]
fn test_data_and_file_schemes_rejected() {
    for raw in ["data:text/html,hi", "file:///etc/passwd", "mailto:a@b.c"] {
        let err = resolver().resolve(raw, None).unwrap_err();
        assert_eq!(err.reason, RejectReason::BadScheme, "for {raw}");
    }
}

#[test]
fn test_scheme_check_applies_to_resolved_reference() {
    let base = Url::parse("https://example.com/docs/").unwrap();
    let err = resolver()
        .resolve("javascript:void(0)", Some(&base))
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::BadScheme);
}

#[test]
fn test_embedded_credentials_rejected() {
    let err = resolver()
        .resolve("https://user:pw@example.com/", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::BadAuthority);
}

#[test]
fn test_credentials_allowed_when_policy_permits() {
    let mut policy = UrlPolicy::default();
    policy.allow_credentials = true;
    let desc = UrlResolver::new(policy)
        .resolve("https://user:pw@example.com/", None)
        .unwrap();
    assert_eq!(desc.host, "example.com");
}

#[test]
fn test_private_hosts_rejected_by_default() {
    for raw in [
        "http://localhost/admin",
        "http://127.0.0.1/",
        "http://10.0.0.5/",
        "http://192.168.1.1/",
        "http://169.254.169.254/latest/meta-data/",
        "http://[::1]/",
    ] {
        let err = resolver().resolve(raw, None).unwrap_err();
        assert_eq!(err.reason, RejectReason::BadAuthority, "for {raw}");
    }
}

#[test]
fn test_private_hosts_allowed_when_policy_permits() {
    let mut policy = UrlPolicy::default();
    policy.allow_private_hosts = true;
    let desc = UrlResolver::new(policy)
        .resolve("http://127.0.0.1:8080/docs", None)
        .unwrap();
    assert_eq!(desc.port, Some(8080));
}

#[test]
fn test_invalid_port_rejected() {
    let err = resolver()
        .resolve("https://example.com:99999/", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::BadPort);
}

#[test]
fn test_path_traversal_rejected() {
    let err = resolver()
        .resolve("https://example.com/../../etc/passwd", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::PathTraversal);
}

#[test]
fn test_encoded_traversal_rejected() {
    let base = Url::parse("https://example.com/docs/page.html").unwrap();
    let err = resolver()
        .resolve("%2e%2e/%2e%2e/%2e%2e/etc/passwd", Some(&base))
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::PathTraversal);
}

#[test]
fn test_backslash_traversal_rejected() {
    // `\` is a path separator to the WHATWG parser, so these merge past the
    // root exactly like their forward-slash forms.
    let err = resolver()
        .resolve(r"https://example.com\..\..\etc\passwd", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::PathTraversal);

    let base = Url::parse("https://example.com/docs/page.html").unwrap();
    let err = resolver().resolve(r"..\..\..\x", Some(&base)).unwrap_err();
    assert_eq!(err.reason, RejectReason::PathTraversal);
}

#[test]
fn test_non_utf8_escape_accepted() {
    // %FF is a well-formed escape for a non-UTF-8 byte; the denylist scan
    // decodes it lossily instead of dropping the URL.
    let desc = resolver().resolve("https://example.com/f%FFle", None).unwrap();
    assert_eq!(desc.host, "example.com");
}

#[test]
fn test_inbounds_relative_traversal_accepted() {
    let base = Url::parse("https://example.com/docs/guide/page.html").unwrap();
    let desc = resolver().resolve("../api/index.html", Some(&base)).unwrap();
    assert_eq!(desc.normalized, "https://example.com/docs/api/index.html");
}

#[test]
fn test_denylist_script_injection_rejected() {
    let err = resolver()
        .resolve("https://example.com/search?q=%3Cscript%3Ealert(1)%3C/script%3E", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::DenylistMatch);
}

#[test]
fn test_denylist_sql_meta_rejected() {
    let err = resolver()
        .resolve("https://example.com/items?id=1%20UNION%20SELECT%20password", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::DenylistMatch);
}

#[test]
fn test_denylist_command_injection_rejected() {
    let err = resolver()
        .resolve("https://example.com/run?cmd=x%3Brm%20-rf", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::DenylistMatch);
}

#[test]
fn test_denylist_is_configurable_data() {
    let mut policy = UrlPolicy::default();
    policy.denylist.clear();
    let desc = UrlResolver::new(policy)
        .resolve("https://example.com/items?id=1%20UNION%20SELECT%20x", None)
        .unwrap();
    assert!(desc.normalized.contains("UNION"));
}

#[test]
fn test_oversize_path_rejected() {
    let long = format!("https://example.com/{}", "a".repeat(4096));
    let err = resolver().resolve(&long, None).unwrap_err();
    assert_eq!(err.reason, RejectReason::Oversize);
}

#[test]
fn test_control_bytes_rejected() {
    let err = resolver()
        .resolve("https://example.com/a\u{0}b", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::Malformed);
}

#[test]
fn test_malformed_percent_encoding_rejected() {
    let err = resolver()
        .resolve("https://example.com/a%2", None)
        .unwrap_err();
    assert_eq!(err.reason, RejectReason::Malformed);
}

// ============================================================================
// Normalization
// ============================================================================

#[test]
fn test_normalization_is_idempotent() {
    let r = resolver();
    for raw in [
        "HTTPS://Example.COM:443/Docs/Page?b=2&a=1#section",
        "http://example.com:80/a/./b/../c",
        "https://example.com/docs/?q=1&q=2",
    ] {
        let first = r.resolve(raw, None).unwrap();
        let second = r.resolve(&first.normalized, None).unwrap();
        assert_eq!(first.normalized, second.normalized, "for {raw}");
    }
}

#[test]
fn test_default_ports_dropped() {
    let desc = resolver().resolve("https://example.com:443/x", None).unwrap();
    assert_eq!(desc.normalized, "https://example.com/x");
    assert_eq!(desc.port, None);
}

#[test]
fn test_fragment_discarded() {
    let desc = resolver()
        .resolve("https://example.com/page#section-3", None)
        .unwrap();
    assert_eq!(desc.normalized, "https://example.com/page");
}

#[test]
fn test_host_case_folded() {
    let desc = resolver().resolve("https://EXAMPLE.com/X", None).unwrap();
    assert_eq!(desc.host, "example.com");
    // Path case is preserved.
    assert_eq!(desc.path, "/X");
}

#[test]
fn test_unicode_host_idna_encoded() {
    let desc = resolver().resolve("https://bücher.example/x", None).unwrap();
    assert_eq!(desc.host, "xn--bcher-kva.example");
}

#[test]
fn test_query_order_preserved_by_default() {
    let desc = resolver()
        .resolve("https://example.com/s?b=2&a=1&a=3", None)
        .unwrap();
    assert_eq!(desc.normalized, "https://example.com/s?b=2&a=1&a=3");
    assert_eq!(
        desc.query_pairs,
        vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
            ("a".to_string(), "3".to_string()),
        ]
    );
}

#[test]
fn test_query_sorting_policy_dedupes_reordered_urls() {
    let mut policy = UrlPolicy::default();
    policy.sort_query = true;
    let r = UrlResolver::new(policy);
    let first = r.resolve("https://example.com/s?b=2&a=1", None).unwrap();
    let second = r.resolve("https://example.com/s?a=1&b=2", None).unwrap();
    assert_eq!(first.normalized, second.normalized);
}

#[test]
fn test_repeated_query_keys_kept() {
    let mut policy = UrlPolicy::default();
    policy.sort_query = true;
    let desc = UrlResolver::new(policy)
        .resolve("https://example.com/s?a=2&a=1", None)
        .unwrap();
    assert_eq!(desc.query_pairs.len(), 2);
}

// ============================================================================
// Domain decomposition and classification
// ============================================================================

#[test]
fn test_multi_part_suffix_decomposition() {
    let desc = resolver()
        .resolve("https://blog.example.co.uk/x", None)
        .unwrap();
    assert_eq!(desc.domain.subdomain.as_deref(), Some("blog"));
    assert_eq!(desc.domain.registrable, "example.co.uk");
    assert_eq!(desc.domain.suffix, "co.uk");
    assert!(desc.domain.confident);
}

#[test]
fn test_fallback_heuristic_flagged_low_confidence() {
    let mut policy = UrlPolicy::default();
    policy.public_suffixes = None;
    let desc = UrlResolver::new(policy)
        .resolve("https://docs.example.com/x", None)
        .unwrap();
    assert_eq!(desc.domain.registrable, "example.com");
    assert!(!desc.domain.confident);
}

#[test]
fn test_classification_internal_external() {
    let r = scoped_resolver("example.com");
    let internal = r.resolve("https://docs.example.com/guide", None).unwrap();
    assert_eq!(internal.kind, UrlKind::Internal);
    let external = r.resolve("https://other.org/guide", None).unwrap();
    assert_eq!(external.kind, UrlKind::External);
}

#[test]
fn test_asset_precedence_over_internal() {
    let r = scoped_resolver("example.com");
    let desc = r.resolve("https://example.com/img/diagram.png", None).unwrap();
    assert_eq!(desc.kind, UrlKind::Asset);
}

#[test]
fn test_unscoped_resolver_classifies_unknown() {
    let desc = resolver().resolve("https://example.com/page", None).unwrap();
    assert_eq!(desc.kind, UrlKind::Unknown);
}
