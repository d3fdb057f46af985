use std::fmt;

use crate::action::{ActionList, Guard};
use crate::byteset::ByteSet;

pub type StateID = usize;

/// The intermediate deterministic automaton produced by subset
/// construction and consumed by minimization.
///
/// States live in an arena and refer to each other by index. Edges are
/// sorted range lists rather than dense 256-wide rows because every edge
/// also carries an action list and a guard; density decisions are deferred
/// to the final machine form.
///
/// Determinism invariant: for any state, byte and guard valuation, at most
/// one outgoing edge applies.
#[derive(Clone)]
pub(crate) struct DFA {
    states: Vec<State>,
    start: StateID,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct State {
    pub accept: bool,
    pub eof_actions: ActionList,
    pub edges: Vec<Edge>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Edge {
    pub bytes: ByteSet,
    pub guard: Guard,
    pub target: StateID,
    pub actions: ActionList,
}

impl DFA {
    pub(crate) fn empty() -> DFA {
        DFA { states: Vec::new(), start: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn start(&self) -> StateID {
        self.start
    }

    pub(crate) fn set_start(&mut self, id: StateID) {
        self.start = id;
    }

    pub(crate) fn state(&self, id: StateID) -> &State {
        &self.states[id]
    }

    pub(crate) fn state_mut(&mut self, id: StateID) -> &mut State {
        &mut self.states[id]
    }

    pub(crate) fn add_state(&mut self) -> StateID {
        let id = self.states.len();
        self.states.push(State::default());
        id
    }

    /// All byte sets labeling edges, for building equivalence classes.
    pub(crate) fn byte_sets(&self) -> impl Iterator<Item = &ByteSet> {
        self.states.iter().flat_map(|s| s.edges.iter()).map(|e| &e.bytes)
    }

    /// The ids of all states reachable from the start state, in discovery
    /// order.
    pub(crate) fn reachable(&self) -> Vec<StateID> {
        let mut seen = vec![false; self.states.len()];
        let mut order = vec![self.start];
        seen[self.start] = true;
        let mut i = 0;
        while i < order.len() {
            let id = order[i];
            i += 1;
            for edge in &self.states[id].edges {
                if !seen[edge.target] {
                    seen[edge.target] = true;
                    order.push(edge.target);
                }
            }
        }
        order
    }
}

impl State {
    /// Add an edge, merging its byte set into an existing edge when the
    /// target, actions and guard coincide.
    pub(crate) fn add_edge(&mut self, edge: Edge) {
        for existing in &mut self.edges {
            if existing.target == edge.target
                && existing.actions == edge.actions
                && existing.guard == edge.guard
            {
                existing.bytes = existing.bytes.union(&edge.bytes);
                return;
            }
        }
        self.edges.push(edge);
    }
}

impl fmt::Debug for DFA {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (id, state) in self.states.iter().enumerate() {
            let mut status = vec![b' ', b' '];
            if id == self.start {
                status[0] = b'>';
            }
            if state.accept {
                status[1] = b'*';
            }
            write!(f, "{}{:04}:", String::from_utf8(status).unwrap(), id)?;
            for edge in &state.edges {
                write!(f, " {:?} => {}", edge.bytes, edge.target)?;
                if !edge.actions.is_empty() {
                    write!(f, " {:?}", edge.actions)?;
                }
                if !edge.guard.is_none() {
                    write!(f, " {:?}", edge.guard)?;
                }
            }
            if state.accept && !state.eof_actions.is_empty() {
                write!(f, " eof{:?}", state.eof_actions)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
