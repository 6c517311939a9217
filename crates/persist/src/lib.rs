//! Persistence: camera snapshot codecs and a file-backed saved-state store.
//!
//! # Invariants
//! - A camera snapshot decodes to exactly the value that was encoded, in both
//!   the JSON and the CBOR form.
//! - Every stored file is listed in the integrity manifest; a load whose
//!   digest does not match fails instead of returning stale data.

pub mod codec;
pub mod store;

pub use codec::{from_cbor, from_json, to_cbor, to_json};
pub use store::{ManifestEntry, PersistError, SavedStateStore, StoreMeta};
