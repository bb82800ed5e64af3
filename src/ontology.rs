//! Typed constructors for the common atom types.

use crate::atom::*;
use crate::error::AtomError;

pub fn concept_node(name: impl Into<String>) -> Atom {
    Atom::node(AtomType::CONCEPT_NODE, name)
}

pub fn predicate_node(name: impl Into<String>) -> Atom {
    Atom::node(AtomType::PREDICATE_NODE, name)
}

/// Link whose outgoing order is significant.
pub fn ordered_link(atom_type: impl Into<AtomType>, outgoing: Vec<AtomId>) -> Atom {
    Atom::link(atom_type, outgoing)
}

pub fn list_link(outgoing: Vec<AtomId>) -> Atom {
    ordered_link(AtomType::LIST_LINK, outgoing)
}

/// `EvaluationLink(predicate, arguments)`, usually with a `ListLink` as
/// the arguments.
pub fn evaluation_link(predicate: AtomId, arguments: AtomId) -> Atom {
    ordered_link(AtomType::EVALUATION_LINK, vec![predicate, arguments])
}

/// `InheritanceLink(child, parent)`
pub fn inheritance_link(child: AtomId, parent: AtomId) -> Atom {
    ordered_link(AtomType::INHERITANCE_LINK, vec![child, parent])
}

pub fn evaluation_predicate(link: &Atom) -> Result<AtomId, AtomError> {
    link.outgoing_atom(0)
}

pub fn evaluation_arguments(link: &Atom) -> Result<AtomId, AtomError> {
    link.outgoing_atom(1)
}
