use std::fmt;

use crate::action::{Action, ActionId, ActionList, Context, Guard, PrecondId};
use crate::byteset::{escape, ByteClasses, ByteSet};
use crate::compile::Config;
use crate::dfa::DFA;

/// The final, compact form of a compiled regex: a deterministic machine
/// ready for execution or code emission.
///
/// States are numbered densely from `1`; the initial state is always `1`.
/// State `0` is the success sentinel an executing matcher ends in, and the
/// negation of the current state signals a runtime input error, so neither
/// appears as a real state. Each state owns a sorted list of byte-range
/// edges; contiguous bytes with the same target, actions and guard share
/// one edge. Accepting states carry the action list to run when the input
/// ends there.
///
/// A machine is immutable and may be shared freely across threads.
#[derive(Clone)]
pub struct Machine {
    /// `states[i]` is machine state `i + 1`.
    states: Vec<State>,
    actions: Vec<Action>,
    preconds: Vec<String>,
    classes: ByteClasses,
}

#[derive(Clone, Debug)]
pub(crate) struct State {
    pub(crate) edges: Vec<Edge>,
    /// `Some` exactly when the state is accepting.
    pub(crate) eof_actions: Option<ActionList>,
}

/// A machine transition: an inclusive byte range, the target state, the
/// actions fired on the consumed byte, and an optional guard.
#[derive(Clone, Debug)]
pub struct Edge {
    pub(crate) lo: u8,
    pub(crate) hi: u8,
    pub(crate) target: u32,
    pub(crate) actions: ActionList,
    pub(crate) guard: Guard,
}

impl Edge {
    /// The inclusive byte range this edge covers.
    pub fn range(&self) -> (u8, u8) {
        (self.lo, self.hi)
    }

    /// The state this edge leads to.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// The actions fired when this edge is taken, in firing order.
    pub fn actions(&self) -> &ActionList {
        &self.actions
    }

    /// The guard literals gating this edge.
    pub fn guard(&self) -> &Guard {
        &self.guard
    }
}

/// The initial state of every machine.
pub const START: u32 = 1;

impl Machine {
    pub(crate) fn from_dfa(dfa: &DFA, ctx: &Context, config: &Config) -> Machine {
        // Renumber states densely in discovery order, so the start state
        // becomes state 1.
        let order = dfa.reachable();
        debug_assert_eq!(order[0], dfa.start());
        let mut new_id = vec![0u32; dfa.len()];
        for (i, &id) in order.iter().enumerate() {
            new_id[id] = (i + 1) as u32;
        }

        let mut states = Vec::with_capacity(order.len());
        for &id in &order {
            let old = dfa.state(id);
            let mut edges = Vec::new();
            for edge in &old.edges {
                for (lo, hi) in edge.bytes.ranges() {
                    edges.push(Edge {
                        lo,
                        hi,
                        target: new_id[edge.target],
                        actions: edge.actions.clone(),
                        guard: edge.guard.clone(),
                    });
                }
            }
            // Guarded edges come first so a matcher trying edges in order
            // falls back to the unguarded transition last.
            edges.sort_by(|a, b| {
                (a.lo, std::cmp::Reverse(a.guard.clone()), a.hi)
                    .cmp(&(b.lo, std::cmp::Reverse(b.guard.clone()), b.hi))
            });
            let edges = merge_adjacent(edges);
            states.push(State {
                edges,
                eof_actions: if old.accept {
                    Some(old.eof_actions.clone())
                } else {
                    None
                },
            });
        }

        let classes = if config.uses_byte_classes() {
            let sets: Vec<ByteSet> = states
                .iter()
                .flat_map(|s| s.edges.iter())
                .map(|e| ByteSet::range(e.lo, e.hi))
                .collect();
            ByteClasses::from_sets(sets.iter())
        } else {
            ByteClasses::singletons()
        };

        Machine {
            states,
            actions: ctx.actions().to_vec(),
            preconds: ctx.preconditions().to_vec(),
            classes,
        }
    }

    /// The number of states. States are numbered `1..=state_count()`.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn state(&self, id: u32) -> &State {
        &self.states[(id - 1) as usize]
    }

    /// The outgoing edges of the given state, sorted by byte range with
    /// guarded edges ahead of unguarded ones for the same bytes.
    pub fn edges(&self, id: u32) -> &[Edge] {
        &self.state(id).edges
    }

    /// Returns true if and only if the given state accepts.
    pub fn is_accept(&self, id: u32) -> bool {
        self.state(id).eof_actions.is_some()
    }

    /// The actions run when the input ends at the given state, or `None`
    /// if the state does not accept.
    pub fn eof_actions(&self, id: u32) -> Option<&ActionList> {
        self.state(id).eof_actions.as_ref()
    }

    /// The set of bytes with an outgoing transition from the given state,
    /// ignoring guards. This is what a runtime error report lists as the
    /// expected input.
    pub fn expected_bytes(&self, id: u32) -> ByteSet {
        let mut set = ByteSet::empty();
        for edge in &self.state(id).edges {
            set = set.union(&ByteSet::range(edge.lo, edge.hi));
        }
        set
    }

    /// The name of the given action.
    pub fn action_name(&self, id: ActionId) -> &str {
        self.actions[id].name()
    }

    /// The priority of the given action.
    pub fn action_priority(&self, id: ActionId) -> i32 {
        self.actions[id].priority()
    }

    /// The name of the given precondition.
    pub fn precondition_name(&self, id: PrecondId) -> &str {
        &self.preconds[id]
    }

    /// The byte equivalence classes of the alphabet this machine actually
    /// uses. Compressed to one class per set of indistinguishable bytes
    /// unless alphabet compression was disabled at compile time.
    pub fn byte_classes(&self) -> &ByteClasses {
        &self.classes
    }
}

/// Merge edges covering adjacent byte ranges with identical behavior.
fn merge_adjacent(edges: Vec<Edge>) -> Vec<Edge> {
    let mut merged: Vec<Edge> = Vec::with_capacity(edges.len());
    for edge in edges {
        if let Some(last) = merged.last_mut() {
            if last.hi as usize + 1 == edge.lo as usize
                && last.target == edge.target
                && last.actions == edge.actions
                && last.guard == edge.guard
            {
                last.hi = edge.hi;
                continue;
            }
        }
        merged.push(edge);
    }
    merged
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, state) in self.states.iter().enumerate() {
            let id = (i + 1) as u32;
            let mut status = vec![b' ', b' '];
            if id == START {
                status[0] = b'>';
            }
            if state.eof_actions.is_some() {
                status[1] = b'*';
            }
            write!(f, "{}{:04}:", String::from_utf8(status).unwrap(), id)?;
            for edge in &state.edges {
                if edge.lo == edge.hi {
                    write!(f, " {} => {}", escape(edge.lo), edge.target)?;
                } else {
                    write!(
                        f,
                        " {}-{} => {}",
                        escape(edge.lo),
                        escape(edge.hi),
                        edge.target,
                    )?;
                }
                if !edge.actions.is_empty() {
                    write!(f, " {:?}", edge.actions)?;
                }
                if !edge.guard.is_none() {
                    write!(f, " {:?}", edge.guard)?;
                }
            }
            if let Some(ref eof) = state.eof_actions {
                if !eof.is_empty() {
                    write!(f, " eof{:?}", eof)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
