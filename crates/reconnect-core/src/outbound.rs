// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Messages sent to the conversational collaborator over the session's duplex channel.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// A fire-and-forget message on the outbound channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// An encoded image frame.
    Media {
        /// MIME type of `data`, e.g. `image/jpeg`.
        mime_type: String,
        /// Base64-encoded payload.
        data: String,
        /// Always `false` for passive frames.
        trigger: bool,
    },
    /// Tagged text.
    Text {
        /// The message.
        text: String,
        /// `true` for out-of-band events.
        trigger: bool,
    },
}

impl OutboundMessage {
    /// A triggered event.
    pub fn event(text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            text: text.into(),
            trigger: true,
        }
    }

    /// Low-priority passive context.
    pub fn passive(text: impl Into<String>) -> Self {
        OutboundMessage::Text {
            text: text.into(),
            trigger: false,
        }
    }

    /// A passive JPEG frame.
    pub fn jpeg(data: String) -> Self {
        OutboundMessage::Media {
            mime_type: "image/jpeg".to_string(),
            data,
            trigger: false,
        }
    }

    /// Whether the message demands an immediate response.
    pub fn is_triggered(&self) -> bool {
        match self {
            OutboundMessage::Media { trigger, .. } | OutboundMessage::Text { trigger, .. } => *trigger,
        }
    }

    /// Serializes to the JSON wire form.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Why a send did not go through.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutboundError {
    /// The channel was closed by this side.
    #[error("outbound channel is closed")]
    Closed,
    /// The receiving side went away.
    #[error("outbound receiver disconnected")]
    Disconnected,
}

/// The single shared outbound handle of a session.
pub trait OutboundChannel: Send {
    /// Sends a message without waiting for delivery.
    fn send(&self, message: OutboundMessage) -> Result<(), OutboundError>;

    /// Closes the channel. Later sends fail with [`OutboundError::Closed`].
    fn close(&self);

    /// Whether sends are still accepted.
    fn is_open(&self) -> bool;
}

/// An [`OutboundChannel`] backed by an unbounded flume channel.
#[derive(Debug)]
pub struct ChannelOutbound {
    sender: flume::Sender<OutboundMessage>,
    open: AtomicBool,
}

impl ChannelOutbound {
    /// Creates the channel and returns the receiving end with it.
    pub fn new() -> (Self, flume::Receiver<OutboundMessage>) {
        let (sender, receiver) = flume::unbounded();
        (
            Self {
                sender,
                open: AtomicBool::new(true),
            },
            receiver,
        )
    }

    /// Wraps an existing sender. Closing this handle leaves other handles on
    /// the same channel open.
    pub fn from_sender(sender: flume::Sender<OutboundMessage>) -> Self {
        Self {
            sender,
            open: AtomicBool::new(true),
        }
    }
}

impl OutboundChannel for ChannelOutbound {
    fn send(&self, message: OutboundMessage) -> Result<(), OutboundError> {
        if !self.is_open() {
            return Err(OutboundError::Closed);
        }
        self.sender
            .send(message)
            .map_err(|_| OutboundError::Disconnected)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            log::debug!("Outbound channel closed.");
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shapes() {
        assert_eq!(
            OutboundMessage::event("[EVENT] Rep 1 Completed.").to_json(),
            r#"{"text":"[EVENT] Rep 1 Completed.","trigger":true}"#
        );
        assert_eq!(
            OutboundMessage::jpeg("AAAA".into()).to_json(),
            r#"{"mime_type":"image/jpeg","data":"AAAA","trigger":false}"#
        );
    }

    #[test]
    fn test_untagged_roundtrip_picks_variant() {
        let msg: OutboundMessage = serde_json::from_str(r#"{"text":"x","trigger":false}"#).unwrap();
        assert_eq!(msg, OutboundMessage::passive("x"));
    }

    #[test]
    fn test_closed_channel_rejects_sends() {
        let (outbound, receiver) = ChannelOutbound::new();
        outbound.send(OutboundMessage::passive("a")).unwrap();
        outbound.close();
        assert!(!outbound.is_open());
        assert_eq!(
            outbound.send(OutboundMessage::passive("b")),
            Err(OutboundError::Closed)
        );
        assert_eq!(receiver.len(), 1);
    }

    #[test]
    fn test_disconnected_receiver() {
        let (outbound, receiver) = ChannelOutbound::new();
        drop(receiver);
        assert_eq!(
            outbound.send(OutboundMessage::passive("a")),
            Err(OutboundError::Disconnected)
        );
    }
}
