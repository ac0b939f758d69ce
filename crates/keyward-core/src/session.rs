//! Secure channel between two participants after a completed exchange.
//!
//! Each direction keeps its own message counter. The channel key and IV for
//! a message are derived from the session key, the sender and the counter:
//!
//! ```text
//! label = sender (u64 BE) || sequence (u64 BE)
//! K     = HMAC-SHA256(key, "keyward-key" || label)
//! IV    = HMAC-SHA256(key, "keyward-iv" || label)[..16]
//! ```
//!
//! Neither goes on the wire. A message whose sender or sequence number was
//! rewritten is checked under a different key and fails its tag, and the
//! plaintext cannot be steered through the IV.

use keyward_crypto::{
    DerivedKey, IV_LEN, KEY_LEN, SecureMessage, TAG_LEN, decrypt, encrypt, hmac_sha256,
};
use zeroize::Zeroizing;

use crate::{
    error::ExchangeError,
    transport::{ParticipantId, Transport},
    wire::WireMessage,
};

const KEY_LABEL: &[u8] = b"keyward-key";
const IV_LABEL: &[u8] = b"keyward-iv";

/// Channel output plus the framing needed to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedMessage {
    /// Participant that sealed the message
    pub sender: ParticipantId,
    /// Sender's counter at sealing time
    pub sequence: u64,
    /// Ciphertext and tag
    pub message: SecureMessage,
}

impl SealedMessage {
    /// Wire form of this message.
    pub fn to_wire(&self) -> WireMessage {
        WireMessage::Sealed {
            sender: self.sender,
            sequence: self.sequence,
            ciphertext: self.message.ciphertext.clone(),
            tag: self.message.tag.to_vec(),
        }
    }

    /// Extract a sealed message from its wire form.
    ///
    /// # Errors
    ///
    /// - `Codec` if `wire` is not a `Sealed` message or its tag is malformed
    pub fn from_wire(wire: WireMessage) -> Result<Self, ExchangeError> {
        let WireMessage::Sealed { sender, sequence, ciphertext, tag } = wire else {
            return Err(ExchangeError::Codec("expected a sealed message".to_string()));
        };

        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|bytes: Vec<u8>| {
            ExchangeError::Codec(format!("tag is {} bytes, expected {TAG_LEN}", bytes.len()))
        })?;

        Ok(Self { sender, sequence, message: SecureMessage { ciphertext, tag } })
    }
}

/// One participant's end of an established channel.
#[derive(Debug)]
pub struct SecureSession {
    local: ParticipantId,
    peer: ParticipantId,
    key: DerivedKey,
    send_sequence: u64,
    recv_sequence: u64,
}

impl SecureSession {
    /// Session keyed with `key`, both counters at zero.
    pub fn new(local: ParticipantId, peer: ParticipantId, key: DerivedKey) -> Self {
        Self { local, peer, key, send_sequence: 0, recv_sequence: 0 }
    }

    /// Our participant id.
    pub fn local(&self) -> ParticipantId {
        self.local
    }

    /// The peer's participant id.
    pub fn peer(&self) -> ParticipantId {
        self.peer
    }

    /// The session key.
    pub fn key(&self) -> &DerivedKey {
        &self.key
    }

    /// Sequence number the next sealed message will carry.
    pub fn send_sequence(&self) -> u64 {
        self.send_sequence
    }

    /// Sequence number the next opened message must carry.
    pub fn recv_sequence(&self) -> u64 {
        self.recv_sequence
    }

    /// Encrypt and tag `plaintext` for the peer.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<SealedMessage, ExchangeError> {
        let sequence = self.send_sequence;
        let next = sequence
            .checked_add(1)
            .ok_or_else(|| ExchangeError::domain("send sequence exhausted"))?;

        let (key, iv) = self.message_keys(self.local, sequence);
        let message = encrypt(plaintext, &key[..], &iv)?;
        self.send_sequence = next;

        tracing::trace!(local = %self.local, sequence, len = plaintext.len(), "sealed message");
        Ok(SealedMessage { sender: self.local, sequence, message })
    }

    /// Verify and decrypt a message from the peer.
    ///
    /// The receive counter only advances on success, so a rejected message
    /// does not desynchronize the session.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailure` if the message names a sender other than
    ///   the peer
    /// - `SequenceMismatch` for a replayed, skipped or reordered message
    /// - `Crypto(Integrity)` if the tag does not verify under this
    ///   message's key
    /// - `Crypto(Padding)` if the tag verifies but the plaintext is malformed
    pub fn open(&mut self, sealed: &SealedMessage) -> Result<Vec<u8>, ExchangeError> {
        if sealed.sender != self.peer {
            return Err(ExchangeError::authentication(format!(
                "sealed message from {}, expected {}",
                sealed.sender, self.peer
            )));
        }

        if sealed.sequence != self.recv_sequence {
            tracing::warn!(
                peer = %self.peer,
                expected = self.recv_sequence,
                actual = sealed.sequence,
                "sequence mismatch"
            );
            return Err(ExchangeError::SequenceMismatch {
                expected: self.recv_sequence,
                actual: sealed.sequence,
            });
        }

        let (key, iv) = self.message_keys(self.peer, sealed.sequence);
        let plaintext = decrypt(&sealed.message, &key[..], &iv)?;
        self.recv_sequence = self.recv_sequence.saturating_add(1);

        tracing::trace!(peer = %self.peer, sequence = sealed.sequence, "opened message");
        Ok(plaintext)
    }

    /// Seal `plaintext` and send it to the peer over `transport`.
    pub fn send<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        plaintext: &[u8],
    ) -> Result<(), ExchangeError> {
        let sealed = self.seal(plaintext)?;
        transport.send(self.peer, sealed.to_wire().encode()?)
    }

    /// Open the next message waiting on `transport`. `Ok(None)` if nothing
    /// has arrived.
    pub fn receive<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<Option<Vec<u8>>, ExchangeError> {
        let Some(payload) = transport.receive(self.local)? else {
            return Ok(None);
        };
        let sealed = SealedMessage::from_wire(WireMessage::decode(&payload)?)?;
        self.open(&sealed).map(Some)
    }

    fn message_keys(
        &self,
        sender: ParticipantId,
        sequence: u64,
    ) -> (Zeroizing<[u8; KEY_LEN]>, [u8; IV_LEN]) {
        let derive = |label: &[u8]| {
            let mut input = Vec::with_capacity(label.len() + 16);
            input.extend_from_slice(label);
            input.extend_from_slice(&sender.0.to_be_bytes());
            input.extend_from_slice(&sequence.to_be_bytes());
            hmac_sha256(self.key.as_bytes(), &input)
        };

        let key = Zeroizing::new(derive(KEY_LABEL));
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&derive(IV_LABEL)[..IV_LEN]);
        (key, iv)
    }
}
