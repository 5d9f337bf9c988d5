use std::collections::BTreeMap;
use wfcore::{Result, Value, WorkflowError};

/// Named value sequences fed to an actor node, one element of each per step
#[derive(Debug, Clone, Default)]
pub struct Sequences {
    values: BTreeMap<String, Vec<Value>>,
    repeat: bool,
    index: usize,
}

impl Sequences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.values.insert(name.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Length of the longest sequence
    pub fn max_len(&self) -> usize {
        self.values.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn configure(&mut self, node: &str) -> Result<()> {
        if self.repeat {
            let mut lengths = self.values.values().map(Vec::len);
            if let Some(first) = lengths.next() {
                if lengths.any(|len| len != first) {
                    return Err(WorkflowError::NodeDeclaration {
                        node: node.to_string(),
                        message: "cannot repeat sequences of varying length".to_string(),
                    }
                    .into());
                }
            }
        }
        self.index = 0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Values for the next step. An exhausted sequence yields null, which
    /// ends the node's flow.
    pub fn next_bundle(&mut self) -> Vec<(String, Value)> {
        let index = self.index;
        self.index += 1;
        self.values
            .iter()
            .map(|(name, values)| {
                let value = if self.repeat && !values.is_empty() {
                    values[index % values.len()].clone()
                } else {
                    values.get(index).cloned().unwrap_or(Value::Null)
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|v| Value::Integer(*v)).collect()
    }

    #[test]
    fn sequences_advance_together_and_exhaust_to_null() {
        let mut sequences = Sequences::new();
        sequences.insert("a", ints(&[1, 2]));
        sequences.insert("b", ints(&[10]));
        sequences.configure("N").unwrap();
        assert_eq!(
            sequences.next_bundle(),
            vec![("a".to_string(), Value::Integer(1)), ("b".to_string(), Value::Integer(10))]
        );
        assert_eq!(
            sequences.next_bundle(),
            vec![("a".to_string(), Value::Integer(2)), ("b".to_string(), Value::Null)]
        );
    }

    #[test]
    fn repeating_cycles_values() {
        let mut sequences = Sequences::new();
        sequences.insert("a", ints(&[1, 2]));
        sequences.set_repeat(true);
        sequences.configure("N").unwrap();
        let taken: Vec<Value> = (0..5).map(|_| sequences.next_bundle()[0].1.clone()).collect();
        assert_eq!(taken, ints(&[1, 2, 1, 2, 1]));
    }

    #[test]
    fn repeating_requires_equal_lengths() {
        let mut sequences = Sequences::new();
        sequences.insert("a", ints(&[1, 2]));
        sequences.insert("b", ints(&[1]));
        sequences.set_repeat(true);
        let err = sequences.configure("N").unwrap_err();
        assert!(err.to_string().contains("cannot repeat sequences of varying length"));
    }
}
