//! Two-pass credential scrubbing.
//!
//! **Pass A** ([`sanitize_markup`]) runs on a document's markup before it is
//! embedded in an artifact. It is markup-aware and lossless: every
//! untrusted-domain URL becomes its stable placeholder (minting one on the
//! spot if the image map doesn't know the URL yet), and any such URL that
//! somehow stays literal has its credential query parameters stripped while
//! the bare URL is kept for debugging.
//!
//! **Pass B** ([`final_sweep`]) runs once on the fully rendered artifact
//! text. It is a blunt pattern-only backstop that must not depend on Pass A
//! having run at all: whole signed URLs, access-key tokens, base64-shaped
//! secret runs, and lone credential parameters are all replaced with a
//! fixed redaction token. Lossy replacement is acceptable here — once text
//! reaches this stage, leak prevention outranks rendering fidelity.

use crate::mapping::ImageMap;
use crate::naming::placeholder_for;
use crate::patterns::{
    ACCESS_KEY, BASE64_SECRET, LONE_CREDENTIAL_PARAM, REDACTION_TOKEN, SIGNED_URL,
    untrusted_url_regex,
};
use regex::Regex;
use std::sync::LazyLock;

/// Credential query parameters with their leading `?` or `&` delimiter,
/// for stripping out of otherwise-kept URLs.
static CREDENTIAL_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    let params = crate::patterns::CREDENTIAL_PARAMS.join("|");
    Regex::new(&format!(r#"[?&](?:{params})=[^&\s"'()<>\]\[]*"#))
        .expect("credential query pattern must compile")
});

/// Pass A: replace untrusted-domain URLs with placeholders, then strip
/// credential parameters from anything still literal.
///
/// URLs with no mapping yet are minted into `map` so the persisted table
/// stays the single source of truth for this document's assets.
pub fn sanitize_markup(markup: &str, map: &mut ImageMap, domains: &[String]) -> String {
    let url_re = untrusted_url_regex(domains);
    let substituted = url_re.replace_all(markup, |caps: &regex::Captures| {
        let url = &caps[0];
        let placeholder = placeholder_for(url);
        if !map.contains(&placeholder) {
            map.insert(placeholder.clone(), url.to_string());
        }
        placeholder
    });

    // Anything the substitution pass left literal keeps its bare URL but
    // loses the secret-bearing parameters.
    strip_credential_params(&substituted)
}

/// Delete credential query parameters (name and value), keeping the rest
/// of the URL intact. When the removed parameter opened the query string,
/// the next `&` is promoted to `?` so the remaining query stays well-formed.
pub fn strip_credential_params(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let range = match CREDENTIAL_QUERY.find(&out) {
            Some(m) => m.range(),
            None => break,
        };
        let opened_query = out.as_bytes()[range.start] == b'?';
        let start = range.start;
        out.replace_range(range, "");
        if opened_query && out.as_bytes().get(start) == Some(&b'&') {
            out.replace_range(start..start + 1, "?");
        }
    }
    out
}

/// Pass B: whole-artifact final sweep. Replaces every credential-shaped
/// match with [`REDACTION_TOKEN`]. Idempotent — sweeping already-swept
/// text is a no-op.
pub fn final_sweep(text: &str) -> String {
    let text = SIGNED_URL.replace_all(text, REDACTION_TOKEN);
    let text = LONE_CREDENTIAL_PARAM.replace_all(&text, REDACTION_TOKEN);
    let mut text = ACCESS_KEY.replace_all(&text, REDACTION_TOKEN).into_owned();

    // The base64 boundary groups consume the delimiter between two adjacent
    // runs, so a single pass can skip the second run. Replacement shrinks
    // the match set every round, so the fixed point is reached quickly.
    let replacement = format!("${{1}}{REDACTION_TOKEN}${{2}}");
    loop {
        let swept = BASE64_SECRET
            .replace_all(&text, replacement.as_str())
            .into_owned();
        if swept == text {
            break;
        }
        text = swept;
    }
    text
}
