//! The five-step ECDH handshake (spec: coordinator sends `HELLO`, worker
//! replies with its core count and key, both derive the session key, then
//! an encrypted `OK` is exchanged in each direction).

use std::io::{Read, Write};

use crate::crypto::{CryptoError, Keypair, Session};
use crate::frame::{recv_encrypted_fields, recv_plain_fields, send_encrypted_fields, send_plain_fields};
use crate::wire::{decode_i32, decode_str, Field, WireError};

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("wire error during handshake: {0}")]
    Wire(#[from] WireError),
    #[error("crypto error during handshake: {0}")]
    Crypto(#[from] CryptoError),
    #[error("expected greeting {expected:?}, got {got:?}")]
    BadGreeting { expected: &'static str, got: String },
    #[error("peer's OK confirmation did not match")]
    OkMismatch,
}

/// Runs the coordinator side of the handshake on a freshly accepted
/// connection. Returns the established session and the worker's declared
/// core count.
pub fn coordinator_handshake(stream: &mut (impl Read + Write)) -> Result<(Session, u32), HandshakeError> {
    let keypair = Keypair::generate();
    send_plain_fields(stream, &[Field::str("HELLO"), Field::Bytes(keypair.public_der())])?;

    let fields = recv_plain_fields(stream, 3)?;
    expect_greeting(&fields[0])?;
    let cores = decode_i32(&fields[1])? as u32;
    let client_public_der = &fields[2];

    let key = keypair.derive_session_key(client_public_der)?;
    let session = Session::new(key);

    let ok = recv_encrypted_fields(stream, &session, 1)?;
    if decode_str(&ok[0]).ok().as_deref() != Some("OK") {
        return Err(HandshakeError::OkMismatch);
    }
    send_encrypted_fields(stream, &session, &[Field::str("OK")])?;

    Ok((session, cores))
}

/// Runs the worker side of the handshake, declaring `core_count` to the
/// coordinator.
pub fn worker_handshake(stream: &mut (impl Read + Write), core_count: u32) -> Result<Session, HandshakeError> {
    let fields = recv_plain_fields(stream, 2)?;
    expect_greeting(&fields[0])?;
    let server_public_der = &fields[1];

    let keypair = Keypair::generate();
    send_plain_fields(
        stream,
        &[
            Field::str("HELLO"),
            Field::I32(core_count as i32),
            Field::Bytes(keypair.public_der()),
        ],
    )?;

    let key = keypair.derive_session_key(server_public_der)?;
    let session = Session::new(key);

    send_encrypted_fields(stream, &session, &[Field::str("OK")])?;
    let ok = recv_encrypted_fields(stream, &session, 1)?;
    if decode_str(&ok[0]).ok().as_deref() != Some("OK") {
        return Err(HandshakeError::OkMismatch);
    }

    Ok(session)
}

fn expect_greeting(field: &[u8]) -> Result<(), HandshakeError> {
    let s = decode_str(field).unwrap_or_default();
    if s == "HELLO" {
        Ok(())
    } else {
        Err(HandshakeError::BadGreeting {
            expected: "HELLO",
            got: s,
        })
    }
}
