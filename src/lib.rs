//! In-memory hypergraph AtomSpace with economic attention allocation.
//!
//! Atoms (nodes and links) are deduplicated structurally: one node per
//! (type, name), one link per (type, outgoing sequence). Each atom carries an
//! attention value that the attention bank decays, spreads along the graph
//! and uses to pick atoms to forget. [`Ecan`] runs that cycle on a timer.

pub mod atom;
pub mod atomspace;
pub mod attention;
pub mod bank;
pub mod ecan;
pub mod error;
pub mod ontology;

pub use atom::{Atom, AtomId, AtomKind, AtomType, TruthValue};
pub use atomspace::{AtomRef, AtomSpace, SharedAtomSpace};
pub use attention::AttentionValue;
pub use bank::AttentionBank;
pub use ecan::{CycleReport, Ecan, EcanConfig};
pub use error::{AtomError, AtomSpaceError, EcanError};
