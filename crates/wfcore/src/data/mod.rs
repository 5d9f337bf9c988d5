//! Packets, URIs, protocols and the packet store

mod packet;
mod protocol;
mod store;
mod uri;

pub use packet::{Packet, PublishedResource, END_OF_STREAM_PATH};
pub use protocol::{ControlProtocol, DataProtocol, Protocol, ProtocolRegistry};
pub use store::PacketStore;
pub use uri::{Uri, UriTemplate};
