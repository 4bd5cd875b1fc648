//! Jupyter wire format.
//!
//! Every message travels as a multipart ZeroMQ message:
//!
//! ```text
//! [identity …] "<IDS|MSG>" signature header parent_header metadata content [buffer …]
//! ```
//!
//! The signature is the hex HMAC-SHA256 of the four JSON frames, keyed with
//! the connection file's key; an empty key means messages are unsigned.

use bytes::Bytes;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{ServerError, ServerResult};

/// Frame separating routing identities from the message proper.
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

/// Messaging protocol version spoken by this kernel.
pub const PROTOCOL_VERSION: &str = "5.3";

type HmacSha256 = Hmac<Sha256>;

/// Message header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub msg_id: String,
    pub session: String,
    pub username: String,
    pub date: String,
    pub msg_type: String,
    pub version: String,
}

/// Signs and verifies messages.
#[derive(Clone)]
pub struct Signer {
    mac: Option<HmacSha256>,
}

impl Signer {
    pub fn new(key: &str) -> ServerResult<Self> {
        if key.is_empty() {
            return Ok(Self { mac: None });
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| ServerError::Protocol(format!("invalid signing key: {}", e)))?;
        Ok(Self { mac: Some(mac) })
    }

    /// Hex signature of `frames`, or an empty string when unsigned.
    pub fn sign(&self, frames: &[&[u8]]) -> String {
        match &self.mac {
            Some(mac) => {
                let mut mac = mac.clone();
                for frame in frames {
                    mac.update(frame);
                }
                hex::encode(mac.finalize().into_bytes())
            }
            None => String::new(),
        }
    }

    /// Check `signature` against `frames`.
    pub fn verify(&self, signature: &[u8], frames: &[&[u8]]) -> ServerResult<()> {
        let Some(mac) = &self.mac else {
            return Ok(());
        };

        let expected = hex::decode(signature).map_err(|_| ServerError::Signature)?;
        let mut mac = mac.clone();
        for frame in frames {
            mac.update(frame);
        }
        mac.verify_slice(&expected).map_err(|_| ServerError::Signature)
    }
}

/// A decoded Jupyter message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Routing identities of the sender (ROUTER sockets) or the topic (PUB).
    pub identities: Vec<Bytes>,
    pub header: Header,
    /// Header of the request this message answers; `{}` when there is none.
    pub parent_header: Value,
    pub metadata: Value,
    pub content: Value,
    pub buffers: Vec<Bytes>,
}

impl Message {
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    /// Parse the frames of a received message, checking its signature.
    pub fn decode(frames: Vec<Bytes>, signer: &Signer) -> ServerResult<Self> {
        let split = frames
            .iter()
            .position(|frame| frame.as_ref() == DELIMITER)
            .ok_or_else(|| ServerError::Protocol("missing <IDS|MSG> delimiter".to_string()))?;

        let mut frames = frames.into_iter();
        let identities: Vec<Bytes> = frames.by_ref().take(split).collect();
        frames.next(); // delimiter

        let rest: Vec<Bytes> = frames.collect();
        if rest.len() < 5 {
            return Err(ServerError::Protocol(format!(
                "expected at least 5 frames after delimiter, got {}",
                rest.len()
            )));
        }

        let signed: [&[u8]; 4] = [&rest[1], &rest[2], &rest[3], &rest[4]];
        signer.verify(&rest[0], &signed)?;

        Ok(Self {
            identities,
            header: serde_json::from_slice(&rest[1])?,
            parent_header: serde_json::from_slice(&rest[2])?,
            metadata: serde_json::from_slice(&rest[3])?,
            content: serde_json::from_slice(&rest[4])?,
            buffers: rest[5..].to_vec(),
        })
    }

    /// Serialize and sign into frames ready for sending.
    pub fn encode(&self, signer: &Signer) -> ServerResult<Vec<Bytes>> {
        let header = serde_json::to_vec(&self.header)?;
        let parent_header = serde_json::to_vec(&self.parent_header)?;
        let metadata = serde_json::to_vec(&self.metadata)?;
        let content = serde_json::to_vec(&self.content)?;

        let signed: [&[u8]; 4] = [&header, &parent_header, &metadata, &content];
        let signature = signer.sign(&signed);

        let mut frames = self.identities.clone();
        frames.push(Bytes::from_static(DELIMITER));
        frames.push(Bytes::from(signature));
        frames.push(Bytes::from(header));
        frames.push(Bytes::from(parent_header));
        frames.push(Bytes::from(metadata));
        frames.push(Bytes::from(content));
        frames.extend(self.buffers.iter().cloned());
        Ok(frames)
    }
}

/// The kernel's side of a messaging session: builds outgoing messages.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    username: String,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: "kernel".to_string(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Fresh header for a message of type `msg_type`.
    pub fn header(&self, msg_type: &str) -> Header {
        Header {
            msg_id: uuid::Uuid::new_v4().to_string(),
            session: self.id.clone(),
            username: self.username.clone(),
            date: chrono::Utc::now().to_rfc3339(),
            msg_type: msg_type.to_string(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    /// Reply to `parent` on the socket it arrived on.
    pub fn reply(&self, parent: &Message, msg_type: &str, content: Value) -> ServerResult<Message> {
        Ok(Message {
            identities: parent.identities.clone(),
            header: self.header(msg_type),
            parent_header: serde_json::to_value(&parent.header)?,
            metadata: Value::Object(Default::default()),
            content,
            buffers: Vec::new(),
        })
    }

    /// Broadcast on IOPub, attributed to `parent`.
    pub fn publish(&self, parent: &Message, msg_type: &str, content: Value) -> ServerResult<Message> {
        let mut message = self.reply(parent, msg_type, content)?;
        message.identities = vec![Bytes::from(msg_type.to_string())];
        Ok(message)
    }

    /// Broadcast on IOPub with no parent request.
    pub fn broadcast(&self, msg_type: &str, content: Value) -> Message {
        Message {
            identities: vec![Bytes::from(msg_type.to_string())],
            header: self.header(msg_type),
            parent_header: Value::Object(Default::default()),
            metadata: Value::Object(Default::default()),
            content,
            buffers: Vec::new(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
