// Public-suffix driven domain decomposition.
//
// Splitting an authority into subdomain / registrable domain / public suffix
// with "last two labels" misclassifies multi-part suffixes like co.uk, so we
// carry a table of the multi-part suffixes that matter for documentation
// hosting and let callers extend (or remove) it. When a caller strips the
// table entirely we fall back to the two-label heuristic and flag the result
// as low confidence.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Multi-part public suffixes bundled by default. Single-label TLDs need no
/// entry here: an unmatched host falls back to its last label as the suffix.
const BUILTIN_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "net.uk", "me.uk", "ltd.uk", "plc.uk", "sch.uk",
    "com.au", "net.au", "org.au", "edu.au", "gov.au", "id.au",
    "co.nz", "net.nz", "org.nz", "govt.nz", "ac.nz",
    "co.jp", "ne.jp", "or.jp", "ac.jp", "go.jp", "ad.jp",
    "com.br", "net.br", "org.br", "gov.br",
    "com.cn", "net.cn", "org.cn", "gov.cn", "edu.cn",
    "com.tw", "org.tw", "edu.tw",
    "com.hk", "org.hk", "edu.hk",
    "com.sg", "org.sg", "edu.sg",
    "com.my", "org.my",
    "co.in", "net.in", "org.in", "ac.in", "gov.in",
    "co.kr", "or.kr", "ac.kr", "go.kr",
    "co.za", "org.za", "ac.za", "gov.za",
    "com.mx", "org.mx",
    "com.ar", "org.ar",
    "com.tr", "org.tr", "edu.tr",
    "co.il", "org.il", "ac.il",
    "com.ua", "org.ua",
    "com.pl", "org.pl", "edu.pl",
    "github.io", "gitlab.io", "readthedocs.io", "pages.dev", "netlify.app", "vercel.app",
];

/// Decomposition of a host into its subdomain, registrable domain and public
/// suffix. `confident` is false when the result came from the two-label
/// fallback heuristic rather than suffix data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainParts {
    pub subdomain: Option<String>,
    pub registrable: String,
    pub suffix: String,
    pub confident: bool,
}

/// Returns the default multi-part suffix table.
pub fn builtin_suffixes() -> Vec<String> {
    BUILTIN_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

/// Decomposes `host` using the given suffix table, or the flagged two-label
/// heuristic when no table is available. IP literals decompose to themselves.
pub fn decompose(host: &str, suffixes: Option<&[String]>) -> DomainParts {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return DomainParts {
            subdomain: None,
            registrable: host.to_string(),
            suffix: String::new(),
            confident: true,
        };
    }

    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() < 2 {
        return DomainParts {
            subdomain: None,
            registrable: host.to_string(),
            suffix: host.to_string(),
            confident: labels.len() == 1,
        };
    }

    let Some(table) = suffixes else {
        // Suffix data unavailable: last two labels, flagged low confidence.
        let registrable = labels[labels.len() - 2..].join(".");
        let subdomain = join_nonempty(&labels[..labels.len() - 2]);
        return DomainParts {
            subdomain,
            registrable,
            suffix: labels[labels.len() - 1].to_string(),
            confident: false,
        };
    };

    if table.iter().any(|s| s == host) {
        // The host itself is a bare suffix.
        return DomainParts {
            subdomain: None,
            registrable: host.to_string(),
            suffix: host.to_string(),
            confident: true,
        };
    }

    // Longest matching suffix wins; an unmatched host keeps its last label
    // as the suffix.
    let mut suffix_labels = 1;
    for take in (2..labels.len()).rev() {
        let candidate = labels[labels.len() - take..].join(".");
        if table.iter().any(|s| s == &candidate) {
            suffix_labels = take;
            break;
        }
    }

    let suffix = labels[labels.len() - suffix_labels..].join(".");
    let registrable = labels[labels.len() - suffix_labels - 1..].join(".");
    let subdomain = join_nonempty(&labels[..labels.len() - suffix_labels - 1]);

    DomainParts {
        subdomain,
        registrable,
        suffix,
        confident: true,
    }
}

fn join_nonempty(labels: &[&str]) -> Option<String> {
    if labels.is_empty() {
        None
    } else {
        Some(labels.join("."))
    }
}
