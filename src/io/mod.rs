//! PTY byte traffic: codec plus bounded read/write primitives.

mod channel;
mod codec;

pub use channel::{IoChannel, ReadMode};
pub use codec::{decode, encode, StreamDecoder};
