//! The forwarding pipeline: fetch, decode, compose, deliver.

use humansize::{format_size, BINARY};
use tracing::{info, info_span, warn};

use crate::compose::{self, Envelope, ForwardSettings};
use crate::error::Result;
use crate::model::event::{self, ForwardResult, TriggerEvent};
use crate::model::mail::{ForwardRequest, RawMessage};
use crate::parser::message::decode_message;
use crate::relay::{self, Relay};
use crate::store::BlobStore;

/// Handles one trigger event at a time against a store and a relay.
pub struct Forwarder<S, R> {
    store: S,
    relay: R,
    settings: ForwardSettings,
    default_bucket: String,
    key_prefix: String,
}

impl<S: BlobStore, R: Relay> Forwarder<S, R> {
    pub fn new(store: S, relay: R, settings: ForwardSettings) -> Self {
        Self {
            store,
            relay,
            settings,
            default_bucket: "email-storage".to_string(),
            key_prefix: "emails/".to_string(),
        }
    }

    /// Where to look for messages whose event carries no storage location.
    pub fn with_default_location(
        mut self,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
    ) -> Self {
        self.default_bucket = bucket.into();
        self.key_prefix = key_prefix.into();
        self
    }

    /// Fetch and decode the stored message, and compose its forwarded copy.
    ///
    /// Fails only when the message cannot be fetched.
    pub fn prepare(&self, event: &TriggerEvent) -> Result<ForwardRequest> {
        let location = event.object_location(&self.default_bucket, &self.key_prefix);
        let bytes = self.store.fetch(&location).map_err(|e| {
            warn!(location = %location, error = %e, "Could not fetch stored message");
            e
        })?;
        info!(
            location = %location,
            size = %format_size(bytes.len(), BINARY),
            "Fetched stored message"
        );

        let raw = RawMessage::new(event.message_id.as_str(), bytes);
        let decoded = decode_message(&raw);
        for anomaly in &decoded.anomalies {
            warn!(%anomaly, "Decoding anomaly");
        }
        let message = decoded.value;
        info!(subject = %message.subject, from = %message.from, "Decoded message");

        Ok(compose::compose(
            &message,
            &raw,
            &Envelope::from(event),
            &self.settings,
        ))
    }

    /// Forward one message.
    ///
    /// A blob fetch failure is the only error; delivery failures are folded
    /// into an unsuccessful [`ForwardResult`].
    pub fn handle(&self, event: &TriggerEvent) -> Result<ForwardResult> {
        let span = info_span!("forward", message_id = %event.message_id);
        let _guard = span.enter();

        info!(
            source = event.source_address(),
            destination = event.destination_address(),
            "Processing inbound message"
        );
        let request = self.prepare(event)?;
        Ok(relay::deliver(
            &self.relay,
            &request,
            &event.message_id,
            self.settings.lang,
        ))
    }

    /// Parse a raw notification and forward it.
    ///
    /// `Ok(None)` means the notification held no mail record.
    pub fn handle_json(&self, json: &str) -> Result<Option<ForwardResult>> {
        match event::parse_event(json)? {
            Some(event) => self.handle(&event).map(Some),
            None => {
                info!("{}", self.settings.lang.msg_no_event());
                Ok(None)
            }
        }
    }
}
