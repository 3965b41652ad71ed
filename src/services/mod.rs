//! Service layer for the observer.
//!
//! - Grid acquisition (`GridSource`, `SheetsSource`, `FileSource`)
//! - Positional decoding (`GridDecoder`)
//! - Change delivery (`Notifier`, `WebhookNotifier`)

pub mod decoder;
pub mod notifier;
pub mod source;

pub use decoder::{DecodeReport, GridDecoder, GridLayout, RowOutcome, SkipReason};
pub use notifier::{Delivery, Notifier, UpdatePayload, WebhookNotifier};
pub use source::{
    FileSource, GridSource, SheetsAuth, SheetsCredentials, SheetsSource, TokenSource,
};
