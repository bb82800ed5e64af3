use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::atom::*;
use crate::attention::AttentionValue;
use crate::bank::{AtomTable, AttentionBank};
use crate::error::AtomSpaceError;

/// An AtomSpace behind the single writer lock shared with the ECAN scheduler.
pub type SharedAtomSpace = Arc<RwLock<AtomSpace>>;

/// Anything that names a stored atom: its id or the atom itself.
pub trait AtomRef {
    fn atom_id(&self) -> AtomId;
}

impl AtomRef for AtomId {
    fn atom_id(&self) -> AtomId {
        *self
    }
}

impl AtomRef for &Atom {
    fn atom_id(&self) -> AtomId {
        self.id
    }
}

impl AtomRef for Atom {
    fn atom_id(&self) -> AtomId {
        self.id
    }
}

type StructureKey = (AtomType, AtomKind);

/// A removed atom that links still point at. Its id stays reserved so a
/// structurally equal atom added later takes it back.
#[derive(Debug)]
struct Detached {
    key: StructureKey,
    referrers: BTreeSet<AtomId>,
}

/// The AtomSpace hypergraph: owns every atom, deduplicates them
/// structurally and keeps the attention bank in step.
#[derive(Debug, Default)]
pub struct AtomSpace {
    atoms: AtomTable,
    // Index: type → name → id for nodes
    nodes: HashMap<AtomType, HashMap<String, AtomId>>,
    // Index: type → ids for links
    links: HashMap<AtomType, BTreeSet<AtomId>>,
    // Index: (type, outgoing) → id for link dedup
    link_index: HashMap<(AtomType, Vec<AtomId>), AtomId>,
    detached: HashMap<AtomId, Detached>,
    detached_keys: HashMap<StructureKey, AtomId>,
    bank: AttentionBank,
}

impl AtomSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedAtomSpace {
        Arc::new(RwLock::new(self))
    }

    pub fn size(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, id: AtomId) -> bool {
        self.atoms.contains_key(&id)
    }

    /// Store `atom`, or return the id of the structurally identical atom
    /// already stored (the argument is then discarded).
    ///
    /// A link is rejected if its outgoing set names an atom that is not
    /// stored; nothing is indexed in that case.
    pub fn add_atom(&mut self, mut atom: Atom) -> Result<AtomId, AtomSpaceError> {
        match &atom.kind {
            AtomKind::Node { name } => {
                if let Some(id) = self.find_node(&atom.atom_type, name) {
                    tracing::debug!(id, "node already stored: {}", atom);
                    return Ok(id);
                }
            }
            AtomKind::Link { outgoing } => {
                if let Some(&missing) = outgoing.iter().find(|id| !self.atoms.contains_key(id)) {
                    return Err(AtomSpaceError::UnknownAtom(missing));
                }
                if let Some(id) = self.find_link(&atom.atom_type, outgoing) {
                    tracing::debug!(id, "link already stored: {}", atom);
                    return Ok(id);
                }
            }
        }

        if !self.detached_keys.is_empty() {
            self.revive(&mut atom);
        }

        let id = atom.id;
        match &atom.kind {
            AtomKind::Node { name } => {
                self.nodes
                    .entry(atom.atom_type.clone())
                    .or_default()
                    .insert(name.clone(), id);
            }
            AtomKind::Link { outgoing } => {
                self.links.entry(atom.atom_type.clone()).or_default().insert(id);
                self.link_index
                    .insert((atom.atom_type.clone(), outgoing.clone()), id);
                for target in outgoing {
                    if let Some(target) = self.atoms.get_mut(target) {
                        target.incoming.insert(id);
                    }
                }
            }
        }
        tracing::debug!(id, "stored {}", atom);
        self.atoms.insert(id, atom);
        self.bank.admit(&self.atoms, id);
        Ok(id)
    }

    /// Give `atom` the id of a detached atom with the same structure, along
    /// with the links that still point at that id.
    fn revive(&mut self, atom: &mut Atom) {
        let key = (atom.atom_type.clone(), atom.kind.clone());
        let Some(old) = self.detached_keys.remove(&key) else {
            return;
        };
        let referrers = self
            .detached
            .remove(&old)
            .map(|d| d.referrers)
            .unwrap_or_default();
        atom.id = old;
        atom.incoming = referrers
            .into_iter()
            .filter(|link| self.atoms.contains_key(link))
            .collect();
        tracing::debug!(id = old, "revived {}", atom);
    }

    /// Drop `link` from the referrers of a detached atom, releasing the
    /// reserved id once nothing points at it.
    fn release_detached(&mut self, target: AtomId, link: AtomId) {
        let Some(detached) = self.detached.get_mut(&target) else {
            return;
        };
        detached.referrers.remove(&link);
        if detached.referrers.is_empty() {
            if let Some(detached) = self.detached.remove(&target) {
                self.detached_keys.remove(&detached.key);
            }
        }
    }

    pub fn get_atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(&id)
    }

    pub fn find_node(&self, atom_type: &AtomType, name: &str) -> Option<AtomId> {
        self.nodes.get(atom_type)?.get(name).copied()
    }

    pub fn find_link(&self, atom_type: &AtomType, outgoing: &[AtomId]) -> Option<AtomId> {
        self.link_index
            .get(&(atom_type.clone(), outgoing.to_vec()))
            .copied()
    }

    pub fn get_node(&self, atom_type: impl Into<AtomType>, name: &str) -> Option<&Atom> {
        let id = self.find_node(&atom_type.into(), name)?;
        self.atoms.get(&id)
    }

    /// All atoms, ordered by id.
    pub fn get_atoms(&self) -> Vec<&Atom> {
        let mut atoms: Vec<_> = self.atoms.values().collect();
        atoms.sort_by_key(|a| a.id);
        atoms
    }

    pub fn get_nodes(&self) -> Vec<&Atom> {
        self.get_atoms().into_iter().filter(|a| a.is_node()).collect()
    }

    pub fn get_links(&self) -> Vec<&Atom> {
        self.get_atoms().into_iter().filter(|a| a.is_link()).collect()
    }

    /// Nodes of the type (by id), then links of the type (by id).
    pub fn get_atoms_by_type(&self, atom_type: impl Into<AtomType>) -> Vec<&Atom> {
        let atom_type = atom_type.into();
        let mut node_ids: Vec<AtomId> = self
            .nodes
            .get(&atom_type)
            .map(|bucket| bucket.values().copied().collect())
            .unwrap_or_default();
        node_ids.sort_unstable();
        let link_ids = self.links.get(&atom_type).into_iter().flatten().copied();
        node_ids
            .into_iter()
            .chain(link_ids)
            .filter_map(|id| self.atoms.get(&id))
            .collect()
    }

    pub fn get_incoming(&self, id: AtomId) -> Vec<AtomId> {
        self.atoms
            .get(&id)
            .map(|a| a.incoming.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn set_truth_value(&mut self, id: AtomId, tv: TruthValue) -> bool {
        match self.atoms.get_mut(&id) {
            Some(atom) => {
                atom.tv = tv;
                true
            }
            None => false,
        }
    }

    /// Remove one atom. Its outgoing targets forget it as an incoming link;
    /// links that point at it stay stored, and its id is held for a
    /// structurally equal atom added later. Returns false if it was absent.
    pub fn remove_atom(&mut self, atom: impl AtomRef) -> bool {
        let id = atom.atom_id();
        let Some(atom) = self.atoms.remove(&id) else {
            return false;
        };

        match &atom.kind {
            AtomKind::Node { name } => {
                if let Some(bucket) = self.nodes.get_mut(&atom.atom_type) {
                    bucket.remove(name);
                    if bucket.is_empty() {
                        self.nodes.remove(&atom.atom_type);
                    }
                }
            }
            AtomKind::Link { outgoing } => {
                if let Some(bucket) = self.links.get_mut(&atom.atom_type) {
                    bucket.remove(&id);
                    if bucket.is_empty() {
                        self.links.remove(&atom.atom_type);
                    }
                }
                self.link_index
                    .remove(&(atom.atom_type.clone(), outgoing.clone()));
                for &target in outgoing {
                    match self.atoms.get_mut(&target) {
                        Some(stored) => {
                            stored.incoming.remove(&id);
                        }
                        None => self.release_detached(target, id),
                    }
                }
            }
        }
        self.bank.retire(&atom);
        if !atom.incoming.is_empty() {
            let key = (atom.atom_type.clone(), atom.kind.clone());
            self.detached_keys.insert(key.clone(), id);
            self.detached.insert(
                id,
                Detached {
                    key,
                    referrers: atom.incoming.clone(),
                },
            );
        }
        tracing::debug!(id, "removed {}", atom);
        true
    }

    /// Remove an atom together with every link that (transitively) points
    /// at it. Returns the number of atoms removed.
    pub fn remove_atom_recursive(&mut self, atom: impl AtomRef) -> usize {
        let id = atom.atom_id();
        let incoming = self.get_incoming(id);
        let mut removed = 0;
        for link in incoming {
            removed += self.remove_atom_recursive(link);
        }
        if self.remove_atom(id) {
            removed += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        self.atoms.clear();
        self.nodes.clear();
        self.links.clear();
        self.link_index.clear();
        self.detached.clear();
        self.detached_keys.clear();
        self.bank.reset();
    }

    // ── attention ──────────────────────────────────────────

    pub fn attention_bank(&self) -> &AttentionBank {
        &self.bank
    }

    pub(crate) fn set_attention_decay(&mut self, rate: f64) {
        self.bank.set_decay_rate(rate);
    }

    pub fn set_attention_value(&mut self, id: AtomId, av: AttentionValue) -> bool {
        self.bank.set_attention_value(&mut self.atoms, id, av)
    }

    pub fn stimulate_atom(&mut self, atom: impl AtomRef, amount: f64) -> bool {
        self.bank.stimulate_atom(&mut self.atoms, atom.atom_id(), amount)
    }

    /// Decay every atom's STI toward zero. Returns how many atoms changed.
    pub fn update_attention(&mut self) -> usize {
        self.bank.update_attention(&mut self.atoms)
    }

    /// Spread activation out of the attentional focus. Returns how many
    /// focus atoms spread.
    pub fn spread_activation(&mut self) -> usize {
        self.bank.spread_activation(&mut self.atoms)
    }

    pub fn get_forgettable_atoms(&self) -> Vec<&Atom> {
        self.bank
            .forgettable_atoms(&self.atoms)
            .into_iter()
            .filter_map(|id| self.atoms.get(&id))
            .collect()
    }

    /// Focus atoms, highest STI first.
    pub fn get_attentional_focus(&self) -> Vec<&Atom> {
        self.bank
            .focus()
            .iter()
            .filter_map(|id| self.atoms.get(id))
            .collect()
    }

    /// Human-readable rendering that resolves outgoing ids to names
    pub fn format_atom(&self, id: AtomId) -> String {
        let Some(atom) = self.atoms.get(&id) else {
            return format!("<unknown:{}>", id);
        };
        match &atom.kind {
            AtomKind::Node { name } => format!("{}:\"{}\"", atom.atom_type, name),
            AtomKind::Link { outgoing } => {
                let parts: Vec<String> = outgoing.iter().map(|&oid| self.short_name(oid)).collect();
                format!("{}:[{}]", atom.atom_type, parts.join("\u{2192}"))
            }
        }
    }

    /// Short name (just the node name or hex id)
    pub fn short_name(&self, id: AtomId) -> String {
        self.atoms
            .get(&id)
            .and_then(|a| a.name().map(str::to_string))
            .unwrap_or_else(|| format!("{:04x}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(name: &str) -> Atom {
        Atom::node(AtomType::CONCEPT_NODE, name)
    }

    #[test]
    fn starts_empty() {
        let space = AtomSpace::new();
        assert_eq!(space.size(), 0);
        assert!(space.is_empty());
        assert!(space.get_atoms().is_empty());
    }

    #[test]
    fn duplicate_node_returns_first() {
        let mut space = AtomSpace::new();
        let first = concept("test");
        let first_id = first.id();
        let second = concept("test");

        assert_eq!(space.add_atom(first).unwrap(), first_id);
        assert_eq!(space.add_atom(second).unwrap(), first_id);
        assert_eq!(space.size(), 1);
        assert_eq!(space.get_node(AtomType::CONCEPT_NODE, "test").unwrap().id(), first_id);
    }

    #[test]
    fn same_name_different_type_are_distinct() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("x")).unwrap();
        let b = space.add_atom(Atom::node(AtomType::PREDICATE_NODE, "x")).unwrap();
        assert_ne!(a, b);
        assert_eq!(space.size(), 2);
    }

    #[test]
    fn duplicate_link_collapses() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("node1")).unwrap();
        let b = space.add_atom(concept("node2")).unwrap();

        let l1 = space.add_atom(Atom::link("TestLink", vec![a, b])).unwrap();
        let l2 = space.add_atom(Atom::link("TestLink", vec![a, b])).unwrap();
        assert_eq!(l1, l2);
        assert_eq!(space.size(), 3);
        assert_eq!(space.get_atoms_by_type("TestLink").len(), 1);
        assert_eq!(space.find_link(&AtomType::new("TestLink"), &[a, b]), Some(l1));

        // Order matters.
        let l3 = space.add_atom(Atom::link("TestLink", vec![b, a])).unwrap();
        assert_ne!(l1, l3);
        assert_eq!(space.size(), 4);
    }

    #[test]
    fn link_registers_incoming_once() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        let l = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();
        space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();

        assert_eq!(space.get_incoming(a), vec![l]);
        assert_eq!(space.get_incoming(b), vec![l]);
    }

    #[test]
    fn link_to_unknown_atom_is_rejected() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let stray = concept("stray").id();
        let err = space
            .add_atom(Atom::link(AtomType::LIST_LINK, vec![a, stray]))
            .unwrap_err();
        assert!(matches!(err, AtomSpaceError::UnknownAtom(id) if id == stray));
        assert_eq!(space.size(), 1);
        assert!(space.get_incoming(a).is_empty());
        assert!(space.get_atoms_by_type(AtomType::LIST_LINK).is_empty());
    }

    #[test]
    fn atoms_by_type_lists_nodes_then_links() {
        let mut space = AtomSpace::new();
        let n = space.add_atom(Atom::node("Mixed", "n")).unwrap();
        let l = space.add_atom(Atom::link("Mixed", vec![n])).unwrap();
        let ids: Vec<AtomId> = space.get_atoms_by_type("Mixed").iter().map(|a| a.id()).collect();
        assert_eq!(ids, vec![n, l]);
        assert_eq!(space.get_nodes().len(), 1);
        assert_eq!(space.get_links().len(), 1);
        assert!(space.get_atoms_by_type("Nothing").is_empty());
    }

    #[test]
    fn remove_node_clears_indices() {
        let mut space = AtomSpace::new();
        let id = space.add_atom(concept("test")).unwrap();
        assert!(space.remove_atom(id));
        assert_eq!(space.size(), 0);
        assert!(space.get_node(AtomType::CONCEPT_NODE, "test").is_none());
        assert!(space.get_atom(id).is_none());
        assert!(space.get_atoms_by_type(AtomType::CONCEPT_NODE).is_empty());
        assert!(!space.remove_atom(id));

        // The name is free again.
        let again = space.add_atom(concept("test")).unwrap();
        assert_ne!(again, id);
    }

    #[test]
    fn remove_link_retracts_incoming() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        let l = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();

        assert!(space.remove_atom(l));
        assert!(space.get_incoming(a).is_empty());
        assert!(space.get_incoming(b).is_empty());
        assert!(space.find_link(&AtomType::LIST_LINK, &[a, b]).is_none());

        // A fresh equal link can be stored again.
        let l2 = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();
        assert_ne!(l, l2);
    }

    #[test]
    fn remove_target_leaves_referring_link() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        let l = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();

        assert!(space.remove_atom(a));
        assert_eq!(space.size(), 2);
        assert!(space.contains(l));
        assert_eq!(space.get_incoming(b), vec![l]);
    }

    #[test]
    fn readded_node_rejoins_its_dangling_link() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("A")).unwrap();
        let b = space.add_atom(concept("B")).unwrap();
        let l = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();

        assert!(space.remove_atom(a));
        assert!(space.get_node(AtomType::CONCEPT_NODE, "A").is_none());

        let a2 = space.add_atom(concept("A")).unwrap();
        assert_eq!(a2, a);
        assert_eq!(space.get_incoming(a2), vec![l]);

        let l2 = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a2, b])).unwrap();
        assert_eq!(l2, l);
        assert_eq!(space.get_atoms_by_type(AtomType::LIST_LINK).len(), 1);
        assert_eq!(space.size(), 3);
    }

    #[test]
    fn readded_link_rejoins_its_dangling_link() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        let p = space.add_atom(Atom::node(AtomType::PREDICATE_NODE, "p")).unwrap();
        let list = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();
        let eval = space
            .add_atom(Atom::link(AtomType::EVALUATION_LINK, vec![p, list]))
            .unwrap();

        space.remove_atom(list);
        assert!(space.get_incoming(a).is_empty());
        let list2 = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();
        assert_eq!(list2, list);
        assert_eq!(space.get_incoming(list2), vec![eval]);
        assert_eq!(space.get_incoming(a), vec![list2]);
        let eval2 = space
            .add_atom(Atom::link(AtomType::EVALUATION_LINK, vec![p, list2]))
            .unwrap();
        assert_eq!(eval2, eval);
    }

    #[test]
    fn reserved_id_is_released_with_its_last_referrer() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("A")).unwrap();
        let b = space.add_atom(concept("B")).unwrap();
        let l = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();

        space.remove_atom(a);
        space.remove_atom(l);
        let a2 = space.add_atom(concept("A")).unwrap();
        assert_ne!(a2, a);
        assert!(space.get_incoming(a2).is_empty());
    }

    #[test]
    fn recursive_remove_takes_incoming_links() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        let p = space.add_atom(Atom::node(AtomType::PREDICATE_NODE, "p")).unwrap();
        let list = space.add_atom(Atom::link(AtomType::LIST_LINK, vec![a, b])).unwrap();
        space
            .add_atom(Atom::link(AtomType::EVALUATION_LINK, vec![p, list]))
            .unwrap();

        assert_eq!(space.remove_atom_recursive(a), 3);
        assert_eq!(space.size(), 2);
        assert!(space.get_incoming(b).is_empty());
        assert!(space.get_incoming(p).is_empty());
        assert_eq!(space.remove_atom_recursive(a), 0);
    }

    #[test]
    fn remove_accepts_atom_reference() {
        let mut space = AtomSpace::new();
        let atom = concept("by-ref");
        let copy = atom.clone();
        space.add_atom(atom).unwrap();
        assert!(space.remove_atom(&copy));
        assert!(space.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("node1")).unwrap();
        space.add_atom(concept("node2")).unwrap();
        space.stimulate_atom(a, 70.0);
        assert_eq!(space.size(), 2);

        space.clear();
        assert_eq!(space.size(), 0);
        assert!(space.get_node(AtomType::CONCEPT_NODE, "node1").is_none());
        assert!(space.get_attentional_focus().is_empty());
        assert_eq!(space.attention_bank().total_sti(), 0.0);
    }

    #[test]
    fn removal_keeps_bank_totals_consistent() {
        let mut space = AtomSpace::new();
        let a = space
            .add_atom(concept("a").with_av(AttentionValue::new(90.0, 10.0, false)))
            .unwrap();
        let b = space.add_atom(concept("b")).unwrap();
        space.stimulate_atom(b, 20.0);
        assert_eq!(space.attention_bank().total_sti(), 110.0);
        assert_eq!(space.attention_bank().total_lti(), 10.0);
        assert_eq!(space.attention_bank().focus(), &[a]);

        space.remove_atom(a);
        assert_eq!(space.attention_bank().total_sti(), 20.0);
        assert_eq!(space.attention_bank().total_lti(), 0.0);
        assert!(space.get_attentional_focus().is_empty());
    }

    #[test]
    fn truth_value_can_be_replaced() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("a")).unwrap();
        assert!(space.set_truth_value(a, TruthValue::new(0.3, 0.4)));
        assert_eq!(space.get_atom(a).unwrap().truth_value(), TruthValue::new(0.3, 0.4));
        assert!(!space.set_truth_value(0, TruthValue::default()));
    }

    #[test]
    fn format_atom_resolves_names() {
        let mut space = AtomSpace::new();
        let a = space.add_atom(concept("cat")).unwrap();
        let b = space.add_atom(concept("mammal")).unwrap();
        let l = space
            .add_atom(Atom::link(AtomType::INHERITANCE_LINK, vec![a, b]))
            .unwrap();
        assert_eq!(space.format_atom(a), "ConceptNode:\"cat\"");
        assert_eq!(space.format_atom(l), "InheritanceLink:[cat\u{2192}mammal]");
        assert_eq!(space.format_atom(0), "<unknown:0>");
    }
}
