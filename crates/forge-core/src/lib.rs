pub mod candidates;
pub mod config;
pub mod crypto;
pub mod frame;
pub mod handshake;
pub mod task;
pub mod wire;
