use std::collections::HashMap;

use log::debug;

use crate::action::{ActionList, Guard};
use crate::byteset::ByteClasses;
use crate::dfa::{self, DFA};

/// Shrink a DFA to its minimal equivalent.
///
/// Two states are equivalent iff they have the same accept flag, the same
/// EOF action list, and for every byte they transition (under the same
/// guard, with the same action list) to equivalent states. The refinement
/// is run to a fixpoint over that signature; the transition signatures here
/// include action lists and guards, which rules out the usual
/// inverse-transition refinement that only looks at targets.
///
/// Unreachable states are dropped before refinement, so the result contains
/// no unreachable states.
pub(crate) fn minimize(dfa: &DFA) -> DFA {
    Minimizer::new(dfa).run()
}

/// The signature of a state under the current partitioning: for each byte
/// class representative, the outgoing behavior in canonical order.
type Signature = Vec<(u8, Vec<(Guard, ActionList, usize)>)>;

struct Minimizer<'a> {
    dfa: &'a DFA,
    /// Reachable states in discovery order from the start state.
    reachable: Vec<dfa::StateID>,
    /// Maps each reachable state to its current partition number.
    partition_of: Vec<usize>,
    partition_count: usize,
    classes: ByteClasses,
}

impl<'a> Minimizer<'a> {
    fn new(dfa: &'a DFA) -> Minimizer<'a> {
        let reachable = dfa.reachable();
        let classes = ByteClasses::from_sets(dfa.byte_sets());
        Minimizer {
            dfa,
            reachable,
            partition_of: vec![usize::MAX; dfa.len()],
            partition_count: 0,
            classes,
        }
    }

    fn run(mut self) -> DFA {
        self.initial_partitions();
        loop {
            let before = self.partition_count;
            self.refine();
            if self.partition_count == before {
                break;
            }
        }
        let minimal = self.rebuild();
        debug!(
            "minimized {} DFA states into {}",
            self.dfa.len(),
            minimal.len(),
        );
        minimal
    }

    /// Group reachable states by (accept flag, EOF action list).
    fn initial_partitions(&mut self) {
        let mut keys: HashMap<(bool, ActionList), usize> = HashMap::new();
        for &id in &self.reachable {
            let state = self.dfa.state(id);
            let key = (state.accept, state.eof_actions.clone());
            let next = keys.len();
            let part = *keys.entry(key).or_insert(next);
            self.partition_of[id] = part;
        }
        self.partition_count = keys.len();
    }

    /// Split partitions whose members disagree on their transition
    /// signature under the current partitioning.
    fn refine(&mut self) {
        let mut keys: HashMap<(usize, Signature), usize> = HashMap::new();
        let mut next_partition = vec![usize::MAX; self.partition_of.len()];
        for &id in &self.reachable {
            let key = (self.partition_of[id], self.signature(id));
            let next = keys.len();
            let part = *keys.entry(key).or_insert(next);
            next_partition[id] = part;
        }
        self.partition_count = keys.len();
        self.partition_of = next_partition;
    }

    fn signature(&self, id: dfa::StateID) -> Signature {
        let mut sig = Vec::new();
        for rep in self.classes.representatives() {
            let mut moves = Vec::new();
            for edge in &self.dfa.state(id).edges {
                if edge.bytes.contains(rep) {
                    moves.push((
                        edge.guard.clone(),
                        edge.actions.clone(),
                        self.partition_of[edge.target],
                    ));
                }
            }
            if !moves.is_empty() {
                moves.sort();
                sig.push((rep, moves));
            }
        }
        sig
    }

    /// Build the minimal DFA with one state per partition. Partitions are
    /// numbered in discovery order of their first member, so the start
    /// state stays first.
    fn rebuild(&self) -> DFA {
        let mut minimal = DFA::empty();
        let mut new_id = vec![usize::MAX; self.partition_count];
        let mut representative = vec![usize::MAX; self.partition_count];
        for &id in &self.reachable {
            let part = self.partition_of[id];
            if new_id[part] == usize::MAX {
                new_id[part] = minimal.add_state();
                representative[part] = id;
            }
        }
        for part in 0..self.partition_count {
            let old = self.dfa.state(representative[part]);
            {
                let state = minimal.state_mut(new_id[part]);
                state.accept = old.accept;
                state.eof_actions = old.eof_actions.clone();
            }
            for edge in &old.edges {
                let target = new_id[self.partition_of[edge.target]];
                minimal.state_mut(new_id[part]).add_edge(dfa::Edge {
                    bytes: edge.bytes,
                    guard: edge.guard.clone(),
                    target,
                    actions: edge.actions.clone(),
                });
            }
        }
        minimal.set_start(new_id[self.partition_of[self.dfa.start()]]);
        minimal
    }
}
