use crate::data::Packet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Where unconsumed packets were found at wrapup
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnusedDataKind {
    Inflow,
    Outflow,
    Queue,
}

impl fmt::Display for UnusedDataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnusedDataKind::Inflow => "inflow",
            UnusedDataKind::Outflow => "outflow",
            UnusedDataKind::Queue => "queue",
        })
    }
}

/// Packets left unconsumed on one inflow, outflow or director queue
#[derive(Debug, Clone)]
pub struct UnusedDataRecord {
    pub node: String,
    pub label: String,
    pub kind: UnusedDataKind,
    pub packets: Vec<Packet>,
}

impl UnusedDataRecord {
    /// Build a record, ignoring end-of-stream packets; `None` when nothing
    /// but end-of-stream remains
    pub fn new(
        node: impl Into<String>,
        label: impl Into<String>,
        kind: UnusedDataKind,
        packets: impl IntoIterator<Item = Packet>,
    ) -> Option<Self> {
        let packets: Vec<Packet> = packets
            .into_iter()
            .filter(|p| !p.is_end_of_stream())
            .collect();
        if packets.is_empty() {
            return None;
        }
        Some(Self {
            node: node.into(),
            label: label.into(),
            kind,
            packets,
        })
    }

    pub fn uris(&self) -> Vec<String> {
        self.packets
            .iter()
            .flat_map(|p| p.uris().map(|u| u.to_string()).collect::<Vec<_>>())
            .collect()
    }
}

impl fmt::Display for UnusedDataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.packets.len();
        let uris = self.uris();
        let quoted: Vec<String> = uris.iter().map(|u| format!("'{}'", u)).collect();
        write!(
            f,
            "{} packet{} in {} '{}' on node [{}] with URI{} {}",
            count,
            if count == 1 { "" } else { "s" },
            self.kind,
            self.label,
            self.node,
            if uris.len() == 1 { "" } else { "s" },
            quoted.join(", ")
        )
    }
}

/// Unused-data records gathered from nodes and the director after a run
#[derive(Debug, Clone, Default)]
pub struct WrapupResult {
    records: Vec<UnusedDataRecord>,
}

impl WrapupResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: Option<UnusedDataRecord>) {
        if let Some(record) = record {
            self.records.push(record);
        }
    }

    pub fn extend(&mut self, other: WrapupResult) {
        self.records.extend(other.records);
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Records sorted by node, label and kind
    pub fn records(&self) -> Vec<&UnusedDataRecord> {
        let mut records: Vec<&UnusedDataRecord> = self.records.iter().collect();
        records.sort_by(|a, b| {
            (a.node.as_str(), a.label.as_str(), a.kind).cmp(&(b.node.as_str(), b.label.as_str(), b.kind))
        });
        records
    }

    /// The warning block for `run` of `workflow`, or `None` when clean
    pub fn report(&self, workflow: &str, run: u64) -> Option<String> {
        if self.records.is_empty() {
            return None;
        }
        let mut text = format!(
            "Warning:  Run {} of workflow <{}> wrapped up with unused data packets:\n",
            run, workflow
        );
        for record in self.records() {
            text.push_str(&record.to_string());
            text.push('\n');
        }
        Some(text)
    }
}

/// Destination for user-facing diagnostics such as unused-data warnings
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, text: &str);
}

#[derive(Debug, Clone, Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn emit(&self, text: &str) {
        eprint!("{}", text);
    }
}

/// Sink collecting diagnostics in memory; clones share the buffer
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    buffer: Arc<Mutex<String>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|b| b.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn clear(&self) {
        match self.buffer.lock() {
            Ok(mut b) => b.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl DiagnosticSink for BufferSink {
    fn emit(&self, text: &str) {
        match self.buffer.lock() {
            Ok(mut b) => b.push_str(text),
            Err(poisoned) => poisoned.into_inner().push_str(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PublishedResource, Uri};
    use crate::Value;

    fn packet(path: &str) -> Packet {
        Packet::single(
            PublishedResource::new(Uri::new("", path), path, Value::Integer(1)),
            Vec::new(),
        )
    }

    #[test]
    fn end_of_stream_alone_is_not_reported() {
        let record = UnusedDataRecord::new("n", "a", UnusedDataKind::Inflow, vec![Packet::end_of_stream()]);
        assert!(record.is_none());
    }

    #[test]
    fn report_is_sorted_and_pluralized() {
        let mut result = WrapupResult::new();
        result.add(UnusedDataRecord::new(
            "Zeta",
            "x",
            UnusedDataKind::Queue,
            vec![packet("/x/1"), packet("/x/2")],
        ));
        result.add(UnusedDataRecord::new("Alpha", "a", UnusedDataKind::Inflow, vec![packet("/a")]));
        assert_eq!(
            result.report("W", 2).unwrap(),
            "Warning:  Run 2 of workflow <W> wrapped up with unused data packets:\n\
             1 packet in inflow 'a' on node [Alpha] with URI '/a'\n\
             2 packets in queue 'x' on node [Zeta] with URIs '/x/1', '/x/2'\n"
        );
    }

    #[test]
    fn buffer_sink_collects_text() {
        let sink = BufferSink::new();
        let shared = sink.clone();
        shared.emit("one\n");
        sink.emit("two\n");
        assert_eq!(sink.contents(), "one\ntwo\n");
    }
}
