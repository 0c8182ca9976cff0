//! Wire interface for Undercroft: tagged text-safe envelopes, the packet
//! codec, and the Ascii85 binary codec.
//!
//! The engine core stays transport-agnostic; this crate defines the
//! serialization contract a server loop and its clients share. Messages
//! travel as JSON [`Envelope`](envelope::Envelope)s whose `tag` selects a
//! decoder from a [`Codec`](envelope::Codec) registry built once at
//! startup. Raw binary payloads ride inside the text envelope as Ascii85.
//!
//! # Example
//!
//! ```
//! use undercroft_wire::envelope::Codec;
//! use undercroft_wire::packet::{MovePacket, Packet};
//! use undercroft_core::entity::EntityId;
//! use undercroft_core::moves::Move;
//!
//! let codec = Codec::standard();
//! let text = codec.encode(&Packet::Move(MovePacket {
//!     entity_id: EntityId::new(1),
//!     mv: Move::Right,
//! })).unwrap();
//! assert!(matches!(codec.decode(&text).unwrap(), Packet::Move(_)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ascii85;
pub mod envelope;
pub mod packet;

pub use ascii85::Ascii85Error;
pub use envelope::{Codec, Envelope, WireError};
pub use packet::{MovePacket, Packet, SyncPacket, TickEndPacket, UpdatePacket};
