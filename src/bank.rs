//! Attention bank: running STI/LTI totals, the attentional focus, decay and
//! spreading activation.
//!
//! The bank holds bookkeeping only. Atoms live in the [`AtomSpace`], which
//! passes its atom table into every mutating call.
//!
//! [`AtomSpace`]: crate::atomspace::AtomSpace

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use crate::atom::{Atom, AtomId};
use crate::attention::AttentionValue;

pub(crate) type AtomTable = HashMap<AtomId, Atom>;

/// Share of a source's STI handed out per spreading step.
pub const SPREAD_FRACTION: f64 = 0.2;

/// Default share of |STI| removed per decay step.
pub const DEFAULT_DECAY_RATE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct AttentionBank {
    // Ids ranked by descending STI, ties by ascending id.
    focus: Vec<AtomId>,
    focus_threshold: f64,
    decay_rate: f64,
    max_sti: f64,
    min_sti: f64,
    total_sti: f64,
    total_lti: f64,
}

impl Default for AttentionBank {
    fn default() -> Self {
        Self::new()
    }
}

impl AttentionBank {
    pub fn new() -> Self {
        Self {
            focus: Vec::new(),
            focus_threshold: AttentionValue::NOTICEABLE,
            decay_rate: DEFAULT_DECAY_RATE,
            max_sti: AttentionValue::MAXIMUM,
            min_sti: -AttentionValue::MAXIMUM,
            total_sti: 0.0,
            total_lti: 0.0,
        }
    }

    /// Focus members, highest STI first.
    pub fn focus(&self) -> &[AtomId] {
        &self.focus
    }

    pub fn in_focus(&self, id: AtomId) -> bool {
        self.focus.contains(&id)
    }

    pub fn focus_threshold(&self) -> f64 {
        self.focus_threshold
    }

    pub fn decay_rate(&self) -> f64 {
        self.decay_rate
    }

    pub fn max_sti(&self) -> f64 {
        self.max_sti
    }

    pub fn min_sti(&self) -> f64 {
        self.min_sti
    }

    pub fn total_sti(&self) -> f64 {
        self.total_sti
    }

    pub fn total_lti(&self) -> f64 {
        self.total_lti
    }

    pub(crate) fn set_decay_rate(&mut self, rate: f64) {
        self.decay_rate = rate;
    }

    /// Rescan every atom and rank those at or above the focus threshold.
    pub(crate) fn rebuild_focus(&mut self, atoms: &AtomTable) {
        let mut ranked: Vec<(f64, AtomId)> = atoms
            .values()
            .filter(|a| a.av.sti >= self.focus_threshold)
            .map(|a| (a.av.sti, a.id))
            .collect();
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        self.focus = ranked.into_iter().map(|(_, id)| id).collect();
    }

    /// Write `av` to the atom and keep the totals in step. Returns the old value.
    fn write(&mut self, atom: &mut Atom, av: AttentionValue) -> AttentionValue {
        let old = atom.av;
        self.total_sti += av.sti - old.sti;
        self.total_lti += av.lti - old.lti;
        atom.av = av;
        tracing::trace!(id = atom.id, old_sti = old.sti, new_sti = av.sti, "attention write");
        old
    }

    /// Returns false if the atom is not stored.
    pub(crate) fn set_attention_value(
        &mut self,
        atoms: &mut AtomTable,
        id: AtomId,
        av: AttentionValue,
    ) -> bool {
        let Some(atom) = atoms.get_mut(&id) else {
            return false;
        };
        let old = self.write(atom, av);
        if av.sti >= self.focus_threshold || old.sti >= self.focus_threshold {
            self.rebuild_focus(atoms);
        }
        true
    }

    /// Raise STI by `amount`, capped at `max_sti`. Negative amounts floor at
    /// `min_sti`.
    pub(crate) fn stimulate_atom(&mut self, atoms: &mut AtomTable, id: AtomId, amount: f64) -> bool {
        let Some(av) = atoms.get(&id).map(|a| a.av) else {
            return false;
        };
        let raised = av.sti + amount;
        let sti = if amount >= 0.0 {
            raised.min(self.max_sti)
        } else {
            raised.max(self.min_sti)
        };
        self.set_attention_value(atoms, id, AttentionValue { sti, ..av })
    }

    /// Move every nonzero STI toward zero by `|sti| * decay_rate`, never
    /// past it. Returns how many atoms were touched.
    pub(crate) fn update_attention(&mut self, atoms: &mut AtomTable) -> usize {
        let mut decayed = 0;
        for atom in atoms.values_mut() {
            let av = atom.av;
            if av.sti == 0.0 {
                continue;
            }
            let amount = av.sti.abs() * self.decay_rate;
            let sti = if av.sti > 0.0 {
                (av.sti - amount).max(0.0)
            } else {
                (av.sti + amount).min(0.0)
            };
            self.write(atom, AttentionValue { sti, ..av });
            decayed += 1;
        }
        self.rebuild_focus(atoms);
        decayed
    }

    /// Every stored atom a forgetting pass may remove.
    pub(crate) fn forgettable_atoms(&self, atoms: &AtomTable) -> Vec<AtomId> {
        let mut ids: Vec<AtomId> = atoms
            .values()
            .filter(|a| a.av.is_disposable())
            .map(|a| a.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Spread `SPREAD_FRACTION` of each spreadable focus atom's STI evenly
    /// over its neighbourhood. The source keeps its own STI. Returns the
    /// number of atoms that spread.
    pub(crate) fn spread_activation(&mut self, atoms: &mut AtomTable) -> usize {
        let sources = self.focus.clone();
        let mut spread = 0;
        for source in sources {
            let Some(atom) = atoms.get(&source) else {
                continue;
            };
            if !atom.av.is_spreadable() {
                continue;
            }
            let amount = atom.av.sti * SPREAD_FRACTION;
            let targets = spread_targets(atoms, atom);
            if targets.is_empty() {
                continue;
            }
            let share = amount / targets.len() as f64;
            for target in targets {
                self.stimulate_atom(atoms, target, share);
            }
            spread += 1;
        }
        spread
    }

    /// Account for a freshly stored atom.
    pub(crate) fn admit(&mut self, atoms: &AtomTable, id: AtomId) {
        let Some(av) = atoms.get(&id).map(|a| a.av) else {
            return;
        };
        self.total_sti += av.sti;
        self.total_lti += av.lti;
        if av.sti >= self.focus_threshold {
            self.rebuild_focus(atoms);
        }
    }

    /// Forget an atom that has left the store.
    pub(crate) fn retire(&mut self, atom: &Atom) {
        self.total_sti -= atom.av.sti;
        self.total_lti -= atom.av.lti;
        self.focus.retain(|&id| id != atom.id);
    }

    pub(crate) fn reset(&mut self) {
        self.focus.clear();
        self.total_sti = 0.0;
        self.total_lti = 0.0;
    }
}

/// Outgoing set (links only), incoming links, and every other member of
/// those incoming links. Atoms no longer stored are skipped.
fn spread_targets(atoms: &AtomTable, source: &Atom) -> BTreeSet<AtomId> {
    let mut targets = BTreeSet::new();
    if let Some(outgoing) = source.outgoing_set() {
        targets.extend(outgoing.iter().copied());
    }
    for &link_id in &source.incoming {
        targets.insert(link_id);
        if let Some(siblings) = atoms.get(&link_id).and_then(Atom::outgoing_set) {
            targets.extend(siblings.iter().copied());
        }
    }
    targets.remove(&source.id);
    targets.retain(|id| atoms.contains_key(id));
    targets
}
