//! Synchronous, blocking frame I/O over any `Read + Write` stream.
//!
//! A frame is `[u32 big-endian length][payload]`. The payload is either a
//! plaintext NUL-separated field list (used only for the handshake's
//! `HELLO` step, before a session key exists) or an `AES\0<ciphertext>`
//! envelope once [`crate::crypto::Session`] is installed.

use std::io::{Read, Write};

use crate::crypto::Session;
use crate::wire::{self, WireError, AES_MARKER, MAX_FRAME_LEN, MSG_LEN_SIZE, SEPARATOR};

/// Reads exactly one frame's raw payload bytes (after stripping the length
/// prefix), or `Err(WireError::ConnectionClosed)` if the peer closed before
/// a full frame arrived.
pub fn read_frame(stream: &mut impl Read) -> Result<Vec<u8>, WireError> {
    let mut len_buf = [0u8; MSG_LEN_SIZE];
    read_exact_or_closed(stream, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(WireError::FrameTooLarge(len, MAX_FRAME_LEN));
    }
    let mut payload = vec![0u8; len as usize];
    read_exact_or_closed(stream, &mut payload)?;
    Ok(payload)
}

fn read_exact_or_closed(stream: &mut impl Read, buf: &mut [u8]) -> Result<(), WireError> {
    if buf.is_empty() {
        return Ok(());
    }
    stream.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            WireError::ConnectionClosed
        } else {
            WireError::Io(e)
        }
    })
}

pub fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<(), WireError> {
    let len = payload.len() as u32;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

/// Sends a plaintext field list as one frame (handshake only).
pub fn send_plain_fields(stream: &mut impl Write, fields: &[wire::Field]) -> Result<(), WireError> {
    write_frame(stream, &wire::encode_fields(fields))
}

/// Reads one frame and splits it into `count` plaintext fields (handshake
/// only).
pub fn recv_plain_fields(stream: &mut impl Read, count: usize) -> Result<Vec<Vec<u8>>, WireError> {
    let payload = read_frame(stream)?;
    wire::split_fields(&payload, count).map(|parts| parts.into_iter().map(|p| p.to_vec()).collect())
}

/// Encrypts a field list under `session` and sends it as one frame, using
/// the `AES\0<ciphertext>` envelope.
pub fn send_encrypted_fields(
    stream: &mut impl Write,
    session: &Session,
    fields: &[wire::Field],
) -> Result<(), WireError> {
    let plaintext = wire::encode_fields(fields);
    let ciphertext = session
        .encrypt(&plaintext)
        .map_err(|_| WireError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "encrypt failed")))?;
    let mut envelope = Vec::with_capacity(AES_MARKER.len() + 1 + ciphertext.len());
    envelope.extend_from_slice(AES_MARKER);
    envelope.push(SEPARATOR);
    envelope.extend_from_slice(&ciphertext);
    write_frame(stream, &envelope)
}

/// Reads one frame, strips the `AES\0` envelope, decrypts under `session`,
/// and splits the plaintext into `count` fields.
pub fn recv_encrypted_fields(
    stream: &mut impl Read,
    session: &Session,
    count: usize,
) -> Result<Vec<Vec<u8>>, WireError> {
    let payload = read_frame(stream)?;
    let rest = strip_aes_marker(&payload)?;
    let plaintext = session
        .decrypt(rest)
        .map_err(|_| WireError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "decrypt failed")))?;
    wire::split_fields(&plaintext, count).map(|parts| parts.into_iter().map(|p| p.to_vec()).collect())
}

/// Reads one frame and decrypts it under `session`, returning the raw
/// plaintext payload without splitting it into fields. Useful when the
/// field count varies with the message type (e.g. `FOUND` vs `DONE`) and
/// the caller must inspect the first field before knowing how many more to
/// expect.
pub fn recv_encrypted_payload(stream: &mut impl Read, session: &Session) -> Result<Vec<u8>, WireError> {
    let payload = read_frame(stream)?;
    let rest = strip_aes_marker(&payload)?;
    session
        .decrypt(rest)
        .map_err(|_| WireError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, "decrypt failed")))
}

fn strip_aes_marker(payload: &[u8]) -> Result<&[u8], WireError> {
    let marker_len = AES_MARKER.len();
    if payload.len() < marker_len + 1 || &payload[..marker_len] != AES_MARKER || payload[marker_len] != SEPARATOR {
        return Err(WireError::FieldCountMismatch {
            expected: 1,
            found: 0,
        });
    }
    Ok(&payload[marker_len + 1..])
}
