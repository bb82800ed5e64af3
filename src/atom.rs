use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::attention::AttentionValue;
use crate::error::AtomError;

/// Simple truth value: strength (probability) and confidence (weight of evidence)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TruthValue {
    pub strength: f64,
    pub confidence: f64,
}

impl TruthValue {
    pub fn new(strength: f64, confidence: f64) -> Self {
        Self {
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.strength) && (0.0..=1.0).contains(&self.confidence)
    }
}

impl Default for TruthValue {
    fn default() -> Self {
        Self::new(1.0, 0.9)
    }
}

impl fmt::Display for TruthValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stv {:.2}/{:.2}", self.strength, self.confidence)
    }
}

/// Type tag of an atom. Any string is a valid tag; the common ones are
/// provided as constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AtomType(Cow<'static, str>);

impl AtomType {
    pub const CONCEPT_NODE: AtomType = AtomType(Cow::Borrowed("ConceptNode"));
    pub const PREDICATE_NODE: AtomType = AtomType(Cow::Borrowed("PredicateNode"));
    pub const LIST_LINK: AtomType = AtomType(Cow::Borrowed("ListLink"));
    pub const EVALUATION_LINK: AtomType = AtomType(Cow::Borrowed("EvaluationLink"));
    pub const INHERITANCE_LINK: AtomType = AtomType(Cow::Borrowed("InheritanceLink"));

    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for AtomType {
    fn from(tag: &'static str) -> Self {
        Self(Cow::Borrowed(tag))
    }
}

impl From<String> for AtomType {
    fn from(tag: String) -> Self {
        Self(Cow::Owned(tag))
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub type AtomId = u64;

static NEXT_ATOM_ID: AtomicU64 = AtomicU64::new(1);

/// Mint a process-unique atom id.
pub fn next_atom_id() -> AtomId {
    NEXT_ATOM_ID.fetch_add(1, Ordering::Relaxed)
}

/// What distinguishes a node from a link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomKind {
    Node { name: String },
    Link { outgoing: Vec<AtomId> },
}

/// A single atom in the AtomSpace hypergraph
#[derive(Debug, Clone)]
pub struct Atom {
    pub(crate) id: AtomId,
    pub(crate) atom_type: AtomType,
    pub(crate) kind: AtomKind,
    pub(crate) tv: TruthValue,
    pub(crate) av: AttentionValue,
    // Links that reference this atom. Ids only, never ownership.
    pub(crate) incoming: BTreeSet<AtomId>,
}

impl Atom {
    fn with_kind(atom_type: AtomType, kind: AtomKind) -> Self {
        Self {
            id: next_atom_id(),
            atom_type,
            kind,
            tv: TruthValue::default(),
            av: AttentionValue::default(),
            incoming: BTreeSet::new(),
        }
    }

    pub fn node(atom_type: impl Into<AtomType>, name: impl Into<String>) -> Self {
        Self::with_kind(atom_type.into(), AtomKind::Node { name: name.into() })
    }

    pub fn link(atom_type: impl Into<AtomType>, outgoing: Vec<AtomId>) -> Self {
        Self::with_kind(atom_type.into(), AtomKind::Link { outgoing })
    }

    pub fn with_tv(mut self, tv: TruthValue) -> Self {
        self.tv = tv;
        self
    }

    pub fn with_av(mut self, av: AttentionValue) -> Self {
        self.av = av;
        self
    }

    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn atom_type(&self) -> &AtomType {
        &self.atom_type
    }

    pub fn kind(&self) -> &AtomKind {
        &self.kind
    }

    pub fn truth_value(&self) -> TruthValue {
        self.tv
    }

    pub fn attention_value(&self) -> AttentionValue {
        self.av
    }

    pub fn incoming_set(&self) -> &BTreeSet<AtomId> {
        &self.incoming
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, AtomKind::Node { .. })
    }

    pub fn is_link(&self) -> bool {
        matches!(self.kind, AtomKind::Link { .. })
    }

    /// Node name, `None` for links.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            AtomKind::Node { name } => Some(name),
            AtomKind::Link { .. } => None,
        }
    }

    /// Outgoing set, `None` for nodes.
    pub fn outgoing_set(&self) -> Option<&[AtomId]> {
        match &self.kind {
            AtomKind::Node { .. } => None,
            AtomKind::Link { outgoing } => Some(outgoing),
        }
    }

    pub fn arity(&self) -> usize {
        self.outgoing_set().map_or(0, <[AtomId]>::len)
    }

    /// Atom at `index` in the outgoing set. Nodes have arity 0, so every
    /// index is out of bounds for them.
    pub fn outgoing_atom(&self, index: usize) -> Result<AtomId, AtomError> {
        let outgoing = self.outgoing_set().unwrap_or(&[]);
        outgoing
            .get(index)
            .copied()
            .ok_or(AtomError::OutgoingIndexOutOfBounds {
                index,
                arity: outgoing.len(),
            })
    }

    /// Structural identity: nodes match on (type, name), links on type and
    /// the positional outgoing sequence. Ids, truth and attention values
    /// are ignored.
    pub fn same_structure(&self, other: &Atom) -> bool {
        self.atom_type == other.atom_type && self.kind == other.kind
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AtomKind::Node { name } => write!(f, "{}(\"{}\")", self.atom_type, name),
            AtomKind::Link { outgoing } => {
                let parts: Vec<String> = outgoing.iter().map(|id| format!("#{id}")).collect();
                write!(f, "{}({})", self.atom_type, parts.join(", "))
            }
        }
    }
}
