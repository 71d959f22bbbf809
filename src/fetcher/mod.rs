//! Optional convenience loaders, gated behind the `fetcher` feature.
//!
//! Nothing under this module is reachable from [`crate::Verifier::verify`];
//! verification is offline and synchronous over caller-supplied trust
//! material. These helpers exist for callers who want to populate that trust
//! material from a live TUF/Fulcio/Rekor deployment or a trusted_root.jsonl
//! fixture before calling into the verifier.

pub mod jsonl;

#[cfg(feature = "fetcher")]
pub mod trust_bundle;

pub use jsonl::{
    load_trusted_root_from_jsonl, select_all_timestamp_authorities, select_certificate_authorities,
    select_timestamp_authorities,
};
