//! Reference-graph encoding for the `advanced` profile.
//!
//! Arrays and objects are stored once in a heap and referenced by index, so
//! shared compounds stay shared and cycles survive the trip.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SerialError};
use crate::path::ValuePath;
use crate::value::{Array, Object, Value};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
enum Node {
    Null,
    Bool(bool),
    Number(Num),
    String(String),
    Date(Num),
    Bytes(Vec<u8>),
    Ref(usize),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Num {
    Finite(f64),
    Nan,
    Infinity,
    NegInfinity,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
enum Slot {
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
}

#[derive(Debug, Serialize, Deserialize)]
struct Graph {
    root: Node,
    heap: Vec<Slot>,
}

/// Check and encode a value.
pub(crate) fn encode(value: &Value) -> Result<Vec<u8>> {
    let graph = GraphWriter::default().finish(value)?;
    Ok(serde_json::to_vec(&graph)?)
}

/// Check a value without producing bytes.
pub(crate) fn check(value: &Value) -> Result<()> {
    GraphWriter::default().finish(value).map(|_| ())
}

pub(crate) fn decode(payload: &[u8]) -> Result<Value> {
    let graph: Graph = serde_json::from_slice(payload)?;

    let shells: Vec<Value> = graph
        .heap
        .iter()
        .map(|slot| match slot {
            Slot::Array(_) => Value::Array(Arc::new(Array::default())),
            Slot::Object(_) => Value::Object(Arc::new(Object::default())),
        })
        .collect();

    for (slot, shell) in graph.heap.into_iter().zip(shells.iter()) {
        match (slot, shell) {
            (Slot::Array(nodes), Value::Array(array)) => {
                let items = nodes
                    .into_iter()
                    .map(|node| resolve(node, &shells))
                    .collect::<Result<Vec<_>>>()?;
                array.replace(items);
            }
            (Slot::Object(entries), Value::Object(object)) => {
                let props = entries
                    .into_iter()
                    .map(|(key, node)| resolve(node, &shells).map(|value| (key, value)))
                    .collect::<Result<Vec<_>>>()?;
                object.replace(props);
            }
            _ => return Err(SerialError::Malformed("heap slot kind changed".into())),
        }
    }

    resolve(graph.root, &shells)
}

fn resolve(node: Node, shells: &[Value]) -> Result<Value> {
    Ok(match node {
        Node::Null => Value::Null,
        Node::Bool(b) => Value::Bool(b),
        Node::Number(n) => Value::Number(n.into()),
        Node::String(s) => Value::String(s),
        Node::Date(n) => Value::Date(n.into()),
        Node::Bytes(bytes) => Value::Bytes(bytes),
        Node::Ref(index) => shells.get(index).cloned().ok_or_else(|| {
            SerialError::Malformed(format!(
                "reference {index} outside heap of {}",
                shells.len()
            ))
        })?,
    })
}

impl From<f64> for Num {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            Num::Nan
        } else if n == f64::INFINITY {
            Num::Infinity
        } else if n == f64::NEG_INFINITY {
            Num::NegInfinity
        } else {
            Num::Finite(n)
        }
    }
}

impl From<Num> for f64 {
    fn from(n: Num) -> Self {
        match n {
            Num::Finite(n) => n,
            Num::Nan => f64::NAN,
            Num::Infinity => f64::INFINITY,
            Num::NegInfinity => f64::NEG_INFINITY,
        }
    }
}

#[derive(Default)]
struct GraphWriter {
    heap: Vec<Option<Slot>>,
    index: HashMap<usize, usize>,
    path: ValuePath,
}

impl GraphWriter {
    fn finish(mut self, value: &Value) -> Result<Graph> {
        let root = self.node(value)?;
        let heap = self
            .heap
            .into_iter()
            .map(|slot| slot.ok_or_else(|| SerialError::Malformed("unfilled heap slot".into())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Graph { root, heap })
    }

    fn node(&mut self, value: &Value) -> Result<Node> {
        match value {
            Value::Null => Ok(Node::Null),
            Value::Bool(b) => Ok(Node::Bool(*b)),
            Value::Number(n) => Ok(Node::Number((*n).into())),
            Value::String(s) => Ok(Node::String(s.clone())),
            Value::Date(ms) => Ok(Node::Date((*ms).into())),
            Value::Bytes(bytes) => Ok(Node::Bytes(bytes.clone())),
            Value::Array(array) => {
                let (slot, fresh) = self.slot_for(value);
                if fresh {
                    let mut nodes = Vec::new();
                    for (index, item) in array.items().iter().enumerate() {
                        self.path.push_index(index);
                        let node = self.node(item);
                        self.path.pop();
                        nodes.push(node?);
                    }
                    self.heap[slot] = Some(Slot::Array(nodes));
                }
                Ok(Node::Ref(slot))
            }
            Value::Object(object) => {
                let (slot, fresh) = self.slot_for(value);
                if fresh {
                    let mut entries = Vec::new();
                    for (key, item) in object.entries() {
                        self.path.push_key(&key);
                        let node = self.node(&item);
                        self.path.pop();
                        entries.push((key, node?));
                    }
                    self.heap[slot] = Some(Slot::Object(entries));
                }
                Ok(Node::Ref(slot))
            }
            Value::Undefined
            | Value::BigInt(_)
            | Value::Symbol(_)
            | Value::Function(_)
            | Value::Promise
            | Value::Proxy(_)
            | Value::Intl(_) => Err(SerialError::Unsupported {
                kind: value.kind(),
                path: self.path.to_string(),
            }),
        }
    }

    /// Heap slot for a compound, reserving one on first sight.
    fn slot_for(&mut self, value: &Value) -> (usize, bool) {
        let id = value.identity().unwrap_or_default();
        if let Some(slot) = self.index.get(&id) {
            return (*slot, false);
        }
        let slot = self.heap.len();
        self.heap.push(None);
        self.index.insert(id, slot);
        (slot, true)
    }
}
