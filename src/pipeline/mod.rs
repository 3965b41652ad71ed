//! Change detection pipeline.
//!
//! - `fingerprint`: content digest of a decoded collection
//! - `observe`: the polling loop tying source, decoder, notifier and checkpoint together

pub mod fingerprint;
pub mod observe;

pub use fingerprint::{Fingerprint, canonical_json, fingerprint};
pub use observe::{CycleReport, MonitorState, Observer};
