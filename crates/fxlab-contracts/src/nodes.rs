use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};

use crate::tensor::ImageTensor;

pub const NODE_CATEGORY: &str = "comfyui-labs-google";

#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    String {
        multiline: bool,
    },
    Int {
        default: i64,
        min: i64,
        max: i64,
    },
    Choice {
        options: Vec<&'static str>,
        default: &'static str,
    },
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub name: &'static str,
    pub kind: InputKind,
    pub required: bool,
}

impl InputSpec {
    pub fn required(name: &'static str, kind: InputKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: InputKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Image,
    String,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Image => "IMAGE",
            OutputKind::String => "STRING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSpec {
    pub name: &'static str,
    pub kind: OutputKind,
}

impl OutputSpec {
    pub const fn new(name: &'static str, kind: OutputKind) -> Self {
        Self { name, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    String(String),
    Int(i64),
    Image(ImageTensor),
}

impl NodeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            NodeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageTensor> {
        match self {
            NodeValue::Image(value) => Some(value),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeValue::String(_) => "STRING",
            NodeValue::Int(_) => "INT",
            NodeValue::Image(_) => "IMAGE",
        }
    }
}

/// Values handed to a node by the host, keyed by input name.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    values: BTreeMap<String, NodeValue>,
}

impl NodeInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: NodeValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: NodeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&NodeValue> {
        self.values.get(name)
    }

    pub fn string(&self, spec: &InputSpec) -> Result<String> {
        match self.get(spec.name) {
            Some(NodeValue::String(value)) => Ok(value.clone()),
            Some(other) => bail!("input '{}' expects STRING, got {}", spec.name, other.kind()),
            None if spec.required => bail!("missing required input '{}'", spec.name),
            None => Ok(String::new()),
        }
    }

    /// Integer input clamped into the declared bounds; absent optional inputs use the default.
    pub fn int(&self, spec: &InputSpec) -> Result<i64> {
        let InputKind::Int { min, max, .. } = spec.kind else {
            bail!("input '{}' is not declared as INT", spec.name);
        };
        Ok(self.int_unclamped(spec)?.clamp(min, max))
    }

    /// Integer input as the host sent it, ignoring the declared bounds.
    pub fn int_unclamped(&self, spec: &InputSpec) -> Result<i64> {
        let InputKind::Int { default, .. } = spec.kind else {
            bail!("input '{}' is not declared as INT", spec.name);
        };
        match self.get(spec.name) {
            Some(NodeValue::Int(value)) => Ok(*value),
            Some(other) => bail!("input '{}' expects INT, got {}", spec.name, other.kind()),
            None if spec.required => bail!("missing required input '{}'", spec.name),
            None => Ok(default),
        }
    }

    /// Choice input as given; absent optional inputs use the declared default.
    pub fn choice(&self, spec: &InputSpec) -> Result<String> {
        let InputKind::Choice { default, .. } = &spec.kind else {
            bail!("input '{}' is not declared as a choice", spec.name);
        };
        match self.get(spec.name) {
            Some(NodeValue::String(value)) => Ok(value.clone()),
            Some(other) => bail!("input '{}' expects STRING, got {}", spec.name, other.kind()),
            None if spec.required => bail!("missing required input '{}'", spec.name),
            None => Ok(default.to_string()),
        }
    }

    pub fn image(&self, spec: &InputSpec) -> Result<Option<&ImageTensor>> {
        match self.get(spec.name) {
            Some(NodeValue::Image(value)) => Ok(Some(value)),
            Some(other) => bail!("input '{}' expects IMAGE, got {}", spec.name, other.kind()),
            None if spec.required => bail!("missing required input '{}'", spec.name),
            None => Ok(None),
        }
    }
}

/// Looks up a declared input by name.
pub fn input_spec<'a>(specs: &'a [InputSpec], name: &str) -> Result<&'a InputSpec> {
    specs
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| anyhow!("node declares no input named '{name}'"))
}

/// One unit of the host graph: typed inputs, typed outputs, one entry point.
pub trait Node: Send + Sync {
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn category(&self) -> &str {
        NODE_CATEGORY
    }
    fn inputs(&self) -> Vec<InputSpec>;
    fn outputs(&self) -> Vec<OutputSpec>;
    fn execute(&self, inputs: &NodeInputs) -> Result<Vec<NodeValue>>;
}

#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, Box<dyn Node>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<N: Node + 'static>(&mut self, node: N) {
        self.nodes.insert(node.name().to_string(), Box::new(node));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Node> {
        self.nodes.get(name).map(|node| node.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// `(name, display name)` pairs, sorted by name.
    pub fn display_names(&self) -> Vec<(String, String)> {
        self.nodes
            .values()
            .map(|node| (node.name().to_string(), node.display_name().to_string()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
