//! # inkpress
//!
//! A secrets-safe blog compiler. Posts live in an external Notion-style
//! workspace whose images are served through short-lived signed
//! object-storage URLs. inkpress turns those posts into static HTML
//! artifacts while making sure no transient credential ever ships: images
//! are rehomed into durable storage under content-derived names, and the
//! text goes through layered credential scrubbing with a destructive
//! fail-closed gate at the end.
//!
//! # Architecture: Placeholder-First Pipeline
//!
//! ```text
//! workspace API ──▶ markdown ──▶ image map ──▶ sanitize ──▶ artifact ──▶ gate
//!                               (rehost all,   (Pass A)     (render +    (sweep,
//!                                persist map)                Pass B)      delete,
//!                                                                         fail)
//! ```
//!
//! The design exists because of a real leak: resolving images one at a
//! time while substituting inline left a window where a signed URL was
//! already part of the rendered output before its replacement landed.
//! inkpress instead resolves a document's whole asset batch and persists
//! the placeholder table *before* any substitution runs, then treats the
//! regex sweeps as defense in depth rather than the primary guarantee.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`source`] | Workspace API client, block model, block-tree → markdown |
//! | [`naming`] | Deterministic placeholder hashing (SHA-256, 32 chars) |
//! | [`patterns`] | Credential regex library shared by scrubber and gate |
//! | [`mapping`] | Per-document image maps: extract, rehost, persist |
//! | [`rehost`] | Idempotent copy of one asset into durable storage |
//! | [`scrub`] | Pass A (markup-aware) and Pass B (final sweep) |
//! | [`render`] | Maud article template, placeholder resolution |
//! | [`compile`] | Orchestration, batch failure policy, gate invocation |
//! | [`gate`] | Post-write recursive sweep; deletes and fails on any match |
//! | [`config`] | `inkpress.toml` loading plus environment secrets |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Idempotent Rehosting
//!
//! A durable blob's name is a pure function of its source URL, and an
//! existence check runs before every upload. Compiling twice moves each
//! asset exactly once; concurrent runs can at worst overwrite a blob with
//! identical bytes.
//!
//! ## Failed Rehosts Stay Visible
//!
//! When an image fetch fails, its map entry keeps the signed source URL
//! instead of disappearing. The resolution step refuses to substitute such
//! entries, and the final sweep sees the hazard if anything else goes
//! wrong. Silently dropping the entry would hide exactly the data the
//! backstop layers need.
//!
//! ## The Gate Deletes First, Then Fails
//!
//! Finding a credential in an emitted artifact is a security condition,
//! not a log line. The gate removes the artifact immediately and still
//! fails the run, so the operator learns the output tree is incomplete
//! rather than discovering it in production.
//!
//! ## Maud Over Template Engines
//!
//! Artifacts are rendered with [Maud](https://maud.lambda.xyz/):
//! compile-time checked HTML, auto-escaped interpolation, no template
//! files to ship. The only unescaped insertion is the converted markdown
//! body, which is sanitized both before and after it passes through.

pub mod compile;
pub mod config;
pub mod gate;
pub mod mapping;
pub mod naming;
pub mod output;
pub mod patterns;
pub mod rehost;
pub mod render;
pub mod scrub;
pub mod source;
