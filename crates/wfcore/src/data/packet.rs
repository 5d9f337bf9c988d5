use super::uri::Uri;
use crate::Value;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Resource path carried by the end-of-stream packet
pub const END_OF_STREAM_PATH: &str = "/EndOfStream";

/// One published datum inside a packet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedResource {
    pub uri: Uri,
    pub key: String,
    pub data: Value,
    pub nullable: bool,
}

impl PublishedResource {
    pub fn new(uri: Uri, key: impl Into<String>, data: Value) -> Self {
        Self {
            uri,
            key: key.into(),
            data,
            nullable: false,
        }
    }
}

#[derive(Debug)]
struct PacketInner {
    resources: Vec<PublishedResource>,
    metadata: Vec<(String, Value)>,
    end_of_stream: bool,
}

/// An immutable, shareable bundle of published resources.
///
/// Packets compare by identity: the same packet delivered to two receivers
/// is equal to itself, while two packets with equal contents are not.
#[derive(Clone)]
pub struct Packet(Arc<PacketInner>);

impl Packet {
    pub fn new(resources: Vec<PublishedResource>, metadata: Vec<(String, Value)>) -> Self {
        Packet(Arc::new(PacketInner {
            resources,
            metadata,
            end_of_stream: false,
        }))
    }

    /// Packet holding a single resource
    pub fn single(resource: PublishedResource, metadata: Vec<(String, Value)>) -> Self {
        Self::new(vec![resource], metadata)
    }

    /// Packet wrapping a bare value with no address
    pub fn from_value(data: Value) -> Self {
        Self::single(PublishedResource::new(Uri::new("", ""), "", data), Vec::new())
    }

    /// The shared end-of-stream marker
    pub fn end_of_stream() -> Packet {
        static EOS: OnceLock<Packet> = OnceLock::new();
        EOS.get_or_init(|| {
            Packet(Arc::new(PacketInner {
                resources: vec![PublishedResource::new(
                    Uri::new("", END_OF_STREAM_PATH),
                    "",
                    Value::String("EndOfStream".to_string()),
                )],
                metadata: Vec::new(),
                end_of_stream: true,
            }))
        })
        .clone()
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.0.end_of_stream
    }

    pub fn resources(&self) -> &[PublishedResource] {
        &self.0.resources
    }

    /// First resource in the packet
    pub fn resource(&self) -> Option<&PublishedResource> {
        self.0.resources.first()
    }

    /// Data of the first resource, or null for an empty packet
    pub fn data(&self) -> Value {
        self.resource()
            .map(|r| r.data.clone())
            .unwrap_or(Value::Null)
    }

    pub fn metadata(&self) -> &[(String, Value)] {
        &self.0.metadata
    }

    pub fn metadata_values(&self) -> impl Iterator<Item = &Value> {
        self.0.metadata.iter().map(|(_, v)| v)
    }

    pub fn uris(&self) -> impl Iterator<Item = &Uri> {
        self.0.resources.iter().map(|r| &r.uri)
    }

    /// Primary URI, used in diagnostics
    pub fn uri(&self) -> Option<&Uri> {
        self.resource().map(|r| &r.uri)
    }

    pub fn same(&self, other: &Packet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl Eq for Packet {}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_end_of_stream() {
            return write!(f, "Packet(EndOfStream)");
        }
        f.debug_struct("Packet")
            .field("resources", &self.0.resources)
            .field("metadata", &self.0.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_stream_is_a_shared_singleton() {
        let a = Packet::end_of_stream();
        let b = Packet::end_of_stream();
        assert!(a.same(&b));
        assert!(a.is_end_of_stream());
        assert_eq!(a.uri().map(|u| u.path()), Some(END_OF_STREAM_PATH));
    }

    #[test]
    fn equal_contents_are_not_the_same_packet() {
        let a = Packet::from_value(Value::Integer(1));
        let b = Packet::from_value(Value::Integer(1));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
