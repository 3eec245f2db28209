//! Credential pattern library.
//!
//! One place to define every regex that recognizes a transient credential
//! fragment: signed object-storage URLs, lone signed-URL query parameters,
//! access-key-shaped tokens, and base64-shaped secret runs. The scrubber
//! ([`crate::scrub`]) and the integrity gate ([`crate::gate`]) both compile
//! their checks from this module so the two layers can never drift apart.
//!
//! Pattern matching is heuristic by construction — a regex cannot prove a
//! string is a secret. The primary guarantee comes from the placeholder-first
//! pipeline (sanitized markup never contains a raw signed URL); these
//! patterns are the backstop that catches deviations, not the sole safeguard.

use regex::Regex;
use std::sync::LazyLock;

/// Replacement token used wherever a pattern match is removed outright.
pub const REDACTION_TOKEN: &str = "[redacted]";

/// Query parameters that carry signed-URL credentials. Matching is on the
/// parameter name; values are always treated as secret.
pub const CREDENTIAL_PARAMS: &[&str] = &[
    "X-Amz-Credential",
    "X-Amz-Security-Token",
    "X-Amz-Signature",
    "X-Amz-Date",
    "AWSAccessKeyId",
    "Security-Token",
    "Credential",
];

/// Host fragments that mark a URL as transient object storage. Any URL whose
/// host contains one of these is untrusted and must never appear literally
/// in an emitted artifact. Overridable via `inkpress.toml`.
pub const DEFAULT_UNTRUSTED_DOMAINS: &[&str] = &["prod-files-secure", "amazonaws.com"];

/// Characters that terminate a URL inside markdown or HTML.
const URL_TAIL: &str = r#"[^\s"'()<>\]\[]"#;

fn credential_param_alternation() -> String {
    CREDENTIAL_PARAMS.join("|")
}

fn domain_alternation(domains: &[String]) -> String {
    domains
        .iter()
        .map(|d| regex::escape(d))
        .collect::<Vec<_>>()
        .join("|")
}

/// Regex matching any URL on one of the given untrusted domains, signed or
/// not. Built per-config because the domain set is user-extensible.
pub fn untrusted_url_regex(domains: &[String]) -> Regex {
    let pattern = format!(
        r#"https?://[^\s"'()<>\]\[]*(?:{}){}*"#,
        domain_alternation(domains),
        URL_TAIL,
    );
    Regex::new(&pattern).expect("untrusted domain pattern must compile")
}

/// Whether a URL belongs to the untrusted transient domain set.
pub fn is_untrusted(url: &str, domains: &[String]) -> bool {
    domains.iter().any(|d| url.contains(d.as_str()))
}

/// Full signed URL on a default untrusted domain: the URL carries at least
/// one credential query parameter.
pub static SIGNED_URL: LazyLock<Regex> = LazyLock::new(|| {
    let domains: Vec<String> = DEFAULT_UNTRUSTED_DOMAINS
        .iter()
        .map(|d| d.to_string())
        .collect();
    let pattern = format!(
        r#"https?://[^\s"'()<>\]\[]*(?:{}){}*[?&](?:{})={}*"#,
        domain_alternation(&domains),
        URL_TAIL,
        credential_param_alternation(),
        URL_TAIL,
    );
    Regex::new(&pattern).expect("signed URL pattern must compile")
});

/// A credential query parameter standing alone (`X-Amz-Signature=...`),
/// outside any recognizable URL.
pub static LONE_CREDENTIAL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r#"(?:{})=[^\s&"'()<>\]\[]+"#,
        credential_param_alternation()
    );
    Regex::new(&pattern).expect("credential param pattern must compile")
});

/// Access-key-shaped token: a known key-id prefix followed by 16-17
/// uppercase alphanumerics.
pub static ACCESS_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:AKIA|ASIA|ABIA|ACCA|AGPA|AIDA|AIPA|ANPA|ANVA|AROA)[A-Z0-9]{16,17}\b")
        .expect("access key pattern must compile")
});

/// Base64-shaped run of 35-40 characters — the shape of a secret access key.
/// The boundary groups keep longer runs (content hashes, encoded payloads)
/// from matching: a run must be exactly 35-40 base64 characters end to end.
pub static BASE64_SECRET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9+/=])[A-Za-z0-9+/=]{35,40}($|[^A-Za-z0-9+/=])")
        .expect("base64 run pattern must compile")
});

/// Any signed-URL style query parameter name on the wire (`X-Amz-*=`).
/// Gate-only: broader than [`LONE_CREDENTIAL_PARAM`], catches parameters
/// the named list doesn't know about.
pub static AMZ_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"X-Amz-[A-Za-z\-]+=[^\s&"'()<>\]\[]+"#).expect("amz param pattern must compile")
});

/// Scan text with the full library. Returns the name of the first pattern
/// that matches, for reporting. Used by the integrity gate; a superset of
/// the final-sweep patterns.
pub fn find_credential(text: &str) -> Option<&'static str> {
    if SIGNED_URL.is_match(text) {
        return Some("signed url");
    }
    if LONE_CREDENTIAL_PARAM.is_match(text) {
        return Some("credential parameter");
    }
    if AMZ_PARAM.is_match(text) {
        return Some("signed-url parameter");
    }
    if ACCESS_KEY.is_match(text) {
        return Some("access key");
    }
    if BASE64_SECRET.is_match(text) {
        return Some("base64 secret");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> Vec<String> {
        DEFAULT_UNTRUSTED_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .collect()
    }

    #[test]
    fn untrusted_url_matches_bare_and_signed() {
        let re = untrusted_url_regex(&domains());
        assert!(re.is_match("https://prod-files-secure.s3.example.com/img.png"));
        assert!(re.is_match(
            "https://bucket.s3.us-west-2.amazonaws.com/a/b.png?X-Amz-Signature=deadbeef"
        ));
        assert!(!re.is_match("https://example.com/img.png"));
    }

    #[test]
    fn untrusted_url_stops_at_markdown_delimiter() {
        let re = untrusted_url_regex(&domains());
        let text = "![x](https://prod-files-secure.s3.example.com/img.png?X-Amz-Date=1)";
        let m = re.find(text).unwrap();
        assert!(!m.as_str().ends_with(')'));
        assert!(m.as_str().ends_with("X-Amz-Date=1"));
    }

    #[test]
    fn signed_url_requires_credential_param() {
        assert!(SIGNED_URL.is_match(
            "https://prod-files-secure.s3.example.com/img.png?X-Amz-Credential=AKIA123"
        ));
        assert!(!SIGNED_URL.is_match("https://prod-files-secure.s3.example.com/img.png"));
        // Credentialed URL on a trusted domain is not a signed-url match
        // (the lone-parameter pattern still catches the parameter itself).
        assert!(!SIGNED_URL.is_match("https://example.com/img.png?X-Amz-Credential=AKIA123"));
    }

    #[test]
    fn lone_param_matches_outside_urls() {
        assert!(LONE_CREDENTIAL_PARAM.is_match("Security-Token=abcdef123"));
        assert!(LONE_CREDENTIAL_PARAM.is_match("X-Amz-Signature=deadbeef"));
        assert!(!LONE_CREDENTIAL_PARAM.is_match("Signature deadbeef"));
    }

    #[test]
    fn access_key_shapes() {
        assert!(ACCESS_KEY.is_match("AKIA1234567890ABCDEF"));
        assert!(ACCESS_KEY.is_match("ASIAABCDEFGHIJKLMNOPQ")); // 17 tail chars
        assert!(!ACCESS_KEY.is_match("AKIA12345")); // too short
        assert!(!ACCESS_KEY.is_match("BKIA1234567890ABCDEF")); // unknown prefix
    }

    #[test]
    fn access_key_not_matched_inside_longer_token() {
        assert!(!ACCESS_KEY.is_match("XAKIA1234567890ABCDEFY1234"));
    }

    #[test]
    fn base64_run_bounds() {
        let secret = "a".repeat(38);
        assert!(BASE64_SECRET.is_match(&format!("key: {secret} end")));
        // 32-char placeholder hashes stay below the window
        assert!(!BASE64_SECRET.is_match(&"b".repeat(32)));
        // 64-char runs (hex digests) are longer than the window and skipped
        assert!(!BASE64_SECRET.is_match(&format!("hash: {} end", "c".repeat(64))));
    }

    #[test]
    fn find_credential_reports_first_hit() {
        assert_eq!(
            find_credential("see https://x.prod-files-secure.example/img?X-Amz-Signature=s"),
            Some("signed url")
        );
        assert_eq!(
            find_credential("key AKIA1234567890ABCDEF leaked"),
            Some("access key")
        );
        assert_eq!(find_credential("perfectly ordinary text"), None);
    }

    #[test]
    fn find_credential_catches_unknown_amz_params() {
        assert_eq!(
            find_credential("X-Amz-Expires=86400"),
            Some("signed-url parameter")
        );
    }
}
