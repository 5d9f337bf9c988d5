use crate::{Value, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A concrete resource address: an optional scheme plus a path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uri {
    scheme: String,
    path: String,
}

impl Uri {
    pub fn new(scheme: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            path: path.into(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scheme.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}:{}", self.scheme, self.path)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed URI expression such as `data:/results/{run}/{x}`.
///
/// Variables in braces are bound from node variables when a packet is
/// published. Two templates address the same stream when their reduced
/// paths (variables replaced by `{}`) are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UriTemplate {
    expression: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn parse(expression: &str) -> Result<Self, WorkflowError> {
        let (scheme, path) = split_scheme(expression);
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = path.chars();

        while let Some(c) = chars.next() {
            match c {
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    let name = name.trim().to_string();
                    if !closed || name.is_empty() || name.contains('{') {
                        return Err(WorkflowError::Invalid(format!(
                            "Malformed URI template '{}'",
                            expression
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name));
                }
                '}' => {
                    return Err(WorkflowError::Invalid(format!(
                        "Malformed URI template '{}'",
                        expression
                    )))
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            expression: expression.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The path with variables left in place
    pub fn path(&self) -> String {
        self.render(|name| format!("{{{}}}", name))
    }

    /// The path with every variable collapsed to `{}`
    pub fn reduced_path(&self) -> String {
        self.render(|_| "{}".to_string())
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Variable(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    pub fn variable_count(&self) -> usize {
        self.variable_names().len()
    }

    /// Bind variables and build the concrete URI.
    ///
    /// Returns the URI together with the values bound to each variable, in
    /// template order, so receivers can recover them positionally.
    pub fn expand(
        &self,
        variables: &HashMap<String, Value>,
        prefix: &str,
        suffix: &str,
    ) -> Result<(Uri, Vec<Value>), WorkflowError> {
        let mut path = String::from(prefix);
        let mut bound = Vec::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => path.push_str(text),
                Segment::Variable(name) => {
                    let value = variables.get(name).ok_or_else(|| {
                        WorkflowError::Configuration(format!(
                            "No value for variable '{}' in URI template '{}'",
                            name, self.expression
                        ))
                    })?;
                    path.push_str(&value.to_string());
                    bound.push(value.clone());
                }
            }
        }
        path.push_str(suffix);
        Ok((Uri::new(self.scheme.clone(), path), bound))
    }

    fn render(&self, variable: impl Fn(&str) -> String) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Variable(name) => variable(name),
            })
            .collect()
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expression)
    }
}

fn split_scheme(expression: &str) -> (&str, &str) {
    match expression.find(':') {
        Some(i) if !expression[..i].contains('/') && !expression[..i].contains('{') => {
            (&expression[..i], &expression[i + 1..])
        }
        _ => ("", expression),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_and_variables() {
        let template = UriTemplate::parse("data:/run/{run}/item/{x}").unwrap();
        assert_eq!(template.scheme(), "data");
        assert_eq!(template.variable_names(), vec!["run", "x"]);
        assert_eq!(template.reduced_path(), "/run/{}/item/{}");
        assert_eq!(template.path(), "/run/{run}/item/{x}");
    }

    #[test]
    fn schemeless_paths_are_accepted() {
        let template = UriTemplate::parse("/product").unwrap();
        assert_eq!(template.scheme(), "");
        assert_eq!(template.variable_count(), 0);
    }

    #[test]
    fn expansion_binds_values_in_order() {
        let template = UriTemplate::parse("/grid/{row}/{col}").unwrap();
        let vars: HashMap<String, Value> = [
            ("row".to_string(), Value::Integer(2)),
            ("col".to_string(), Value::Integer(7)),
        ]
        .into_iter()
        .collect();
        let (uri, bound) = template.expand(&vars, "/run3", "/1").unwrap();
        assert_eq!(uri.path(), "/run3/grid/2/7/1");
        assert_eq!(bound, vec![Value::Integer(2), Value::Integer(7)]);
    }

    #[test]
    fn unbound_variable_is_an_error() {
        let template = UriTemplate::parse("/grid/{row}").unwrap();
        assert!(template.expand(&HashMap::new(), "", "").is_err());
    }

    #[test]
    fn unbalanced_braces_are_rejected() {
        assert!(UriTemplate::parse("/grid/{row").is_err());
        assert!(UriTemplate::parse("/grid/row}").is_err());
    }
}
