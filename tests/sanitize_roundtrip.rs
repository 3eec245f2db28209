//! End-to-end sanitization checks against the public crate surface:
//! markup with live signed URLs goes through both scrubber passes and a
//! rendered tree goes through the integrity gate, with no network and no
//! mocks involved.

use inkpress::gate;
use inkpress::mapping::ImageMap;
use inkpress::naming::{PLACEHOLDER_PREFIX, placeholder_for};
use inkpress::patterns::find_credential;
use inkpress::render;
use inkpress::scrub;
use std::collections::BTreeMap;
use std::fs;
use tempfile::TempDir;

const SIGNED: &str = "https://prod-files-secure.s3.example.com/img.png?X-Amz-Credential=AKIA1234567890ABCDEF&X-Amz-Signature=deadbeef";

fn domains() -> Vec<String> {
    vec!["prod-files-secure".into(), "amazonaws.com".into()]
}

#[test]
fn signed_markup_becomes_clean_artifact() {
    let markup = format!("# Post\n\n![x]({SIGNED})\n\nplain prose");
    let mut map = ImageMap::new();
    map.insert(
        placeholder_for(SIGNED),
        "https://durable.example/images/a.png".to_string(),
    );

    let sanitized = scrub::sanitize_markup(&markup, &mut map, &domains());
    let resolved = render::resolve_placeholders(&sanitized, &map, &BTreeMap::new(), &domains());
    let body = render::markdown_to_html(&resolved);
    let page = render::render_article("Post", Some("2026-01-15"), &body);
    let artifact = scrub::final_sweep(&page);

    assert!(artifact.contains("https://durable.example/images/a.png"));
    assert_eq!(find_credential(&artifact), None);
}

#[test]
fn unmapped_url_leaves_placeholder_not_secret() {
    let markup = format!("![x]({SIGNED})");
    let mut map = ImageMap::new();

    let sanitized = scrub::sanitize_markup(&markup, &mut map, &domains());
    let resolved = render::resolve_placeholders(&sanitized, &map, &BTreeMap::new(), &domains());
    let artifact = scrub::final_sweep(&render::markdown_to_html(&resolved));

    assert!(artifact.contains(PLACEHOLDER_PREFIX));
    assert_eq!(find_credential(&artifact), None);
}

#[test]
fn gate_removes_tampered_artifact_then_reports_clean_tree() {
    let tmp = TempDir::new().unwrap();
    let good = tmp.path().join("doc-1/index.html");
    let bad = tmp.path().join("doc-2/index.html");
    fs::create_dir_all(good.parent().unwrap()).unwrap();
    fs::create_dir_all(bad.parent().unwrap()).unwrap();
    fs::write(&good, "<p>harmless</p>").unwrap();
    // Simulated post-compile tampering: a raw access key in the artifact
    fs::write(&bad, "<p>AKIA1234567890ABCDEF</p>").unwrap();

    let first = gate::sweep(tmp.path());
    assert!(!first.clean);
    assert_eq!(first.removed, vec![bad.clone()]);
    assert!(!bad.exists());
    assert!(good.exists());

    let second = gate::sweep(tmp.path());
    assert!(second.clean);
    assert!(second.removed.is_empty());
}
