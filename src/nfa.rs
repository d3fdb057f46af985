use std::fmt;
use std::ops::Range;

use log::warn;

use crate::action::{ActionList, Context, Guard};
use crate::byteset::ByteSet;
use crate::compile::Config;
use crate::determinize;
use crate::dfa::DFA;
use crate::error::{Error, Result};
use crate::regex::{Regex, RegexKind};

pub type StateID = usize;

/// A byte oriented non-deterministic finite automaton with action
/// annotations on its edges.
///
/// States live in an arena and refer to each other by index, so the cyclic
/// transition graph needs no shared ownership. There is a single start
/// state and a single accepting state; an input is in the NFA's language if
/// and only if some path of matching edges ends at the accepting state.
///
/// Epsilon edges may carry actions and guards. An action on an epsilon edge
/// is charged forward: it fires on the next byte consumed after the edge is
/// crossed, or at end of input if the accepting state is reached first.
/// This is what makes enter and exit hooks land on the right byte once the
/// NFA is determinized.
#[derive(Clone)]
pub struct NFA {
    states: Vec<State>,
    start: StateID,
    accept: StateID,
}

/// A single NFA state: a list of outgoing edges in declaration order.
#[derive(Clone, Debug, Default)]
pub struct State {
    pub edges: Vec<Edge>,
}

/// An edge between two NFA states.
#[derive(Clone, Debug)]
pub struct Edge {
    pub label: Label,
    pub target: StateID,
    pub actions: ActionList,
    pub guard: Guard,
}

/// An edge label: either a consumed byte drawn from a set, or nothing.
#[derive(Clone, Debug)]
pub enum Label {
    Epsilon,
    Bytes(ByteSet),
}

impl Edge {
    pub(crate) fn is_epsilon(&self) -> bool {
        matches!(self.label, Label::Epsilon)
    }

    pub(crate) fn byte_set(&self) -> Option<&ByteSet> {
        match self.label {
            Label::Epsilon => None,
            Label::Bytes(ref set) => Some(set),
        }
    }
}

/// A sub-automaton under construction, with a single entry and a single
/// exit state.
#[derive(Clone, Copy, Debug)]
struct Fragment {
    start: StateID,
    end: StateID,
}

impl NFA {
    /// Compile the given regex into an NFA, interning action and
    /// precondition names into the context.
    pub(crate) fn compile(
        re: &Regex,
        ctx: &mut Context,
        config: &Config,
    ) -> Result<NFA> {
        let mut compiler = Compiler { states: Vec::new(), ctx, config };
        let frag = compiler.build(re)?;
        Ok(NFA { states: compiler.states, start: frag.start, accept: frag.end })
    }

    pub(crate) fn start(&self) -> StateID {
        self.start
    }

    pub(crate) fn accept(&self) -> StateID {
        self.accept
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn state(&self, id: StateID) -> &State {
        &self.states[id]
    }

    /// All byte sets labeling edges, for building equivalence classes.
    pub(crate) fn byte_sets(&self) -> impl Iterator<Item = &ByteSet> {
        self.states
            .iter()
            .flat_map(|s| s.edges.iter())
            .filter_map(|e| e.byte_set())
    }
}

struct Compiler<'a> {
    states: Vec<State>,
    ctx: &'a mut Context,
    config: &'a Config,
}

impl<'a> Compiler<'a> {
    fn build(&mut self, re: &Regex) -> Result<Fragment> {
        let lo = self.states.len();
        let frag = match *re.kind() {
            RegexKind::Empty => {
                let start = self.add_state();
                let end = self.add_state();
                self.add_epsilon(start, end);
                Fragment { start, end }
            }
            RegexKind::Symbol(ref set) => {
                if set.is_empty() {
                    return Err(Error::empty_byte_set());
                }
                let start = self.add_state();
                let end = self.add_state();
                self.states[start].edges.push(Edge {
                    label: Label::Bytes(*set),
                    target: end,
                    actions: ActionList::empty(),
                    guard: Guard::none(),
                });
                Fragment { start, end }
            }
            RegexKind::Concat(ref children) => {
                let mut it = children.iter();
                let first = match it.next() {
                    None => {
                        let start = self.add_state();
                        let end = self.add_state();
                        self.add_epsilon(start, end);
                        Fragment { start, end }
                    }
                    Some(child) => self.build(child)?,
                };
                let mut frag = first;
                for child in it {
                    let next = self.build(child)?;
                    self.add_epsilon(frag.end, next.start);
                    frag.end = next.end;
                }
                frag
            }
            RegexKind::Alt(ref left, ref right) => {
                let start = self.add_state();
                let end = self.add_state();
                let lfrag = self.build(left)?;
                let rfrag = self.build(right)?;
                // Edge insertion order is declaration order; the left
                // alternative is declared first.
                self.add_epsilon(start, lfrag.start);
                self.add_epsilon(start, rfrag.start);
                self.add_epsilon(lfrag.end, end);
                self.add_epsilon(rfrag.end, end);
                Fragment { start, end }
            }
            RegexKind::Rep(ref inner) => {
                let start = self.add_state();
                let end = self.add_state();
                let ifrag = self.build(inner)?;
                self.add_epsilon(start, ifrag.start);
                self.add_epsilon(start, end);
                // Looping back re-enters the sub-language, so any enter
                // actions on the inner fragment fire again per iteration.
                self.add_epsilon(ifrag.end, ifrag.start);
                self.add_epsilon(ifrag.end, end);
                Fragment { start, end }
            }
            RegexKind::And(ref left, ref right) => {
                self.build_product(left, right, false)?
            }
            RegexKind::Diff(ref left, ref right) => {
                self.build_product(left, right, true)?
            }
        };
        let hi = self.states.len();
        self.annotate(re, frag, lo..hi)
    }

    /// Install the node's annotations around a freshly built fragment.
    ///
    /// Final and all actions attach to byte edges inside the fragment.
    /// Exit actions ride an epsilon edge out of the fragment's exit and
    /// enter actions (with the precondition, if any) ride an epsilon edge
    /// into its entry, so that determinization charges them to the byte
    /// after and the byte ahead respectively.
    fn annotate(
        &mut self,
        re: &Regex,
        mut frag: Fragment,
        range: Range<StateID>,
    ) -> Result<Fragment> {
        if !re.final_actions().is_empty() {
            let list = self.intern(re.final_actions());
            let mut attached = false;
            for id in range.clone() {
                for i in 0..self.states[id].edges.len() {
                    let edge = &self.states[id].edges[i];
                    if edge.target == frag.end && !edge.is_epsilon() {
                        let actions = edge.actions.concat(&list, self.ctx);
                        self.states[id].edges[i].actions = actions;
                        attached = true;
                    }
                }
            }
            if !attached {
                warn!(
                    "final action(s) {:?} on `{}` have no byte transition \
                     to attach to and will never fire",
                    re.final_actions(),
                    re,
                );
            }
        }

        if !re.all_actions().is_empty() {
            let list = self.intern(re.all_actions());
            for id in range {
                for i in 0..self.states[id].edges.len() {
                    if !self.states[id].edges[i].is_epsilon() {
                        let actions =
                            self.states[id].edges[i].actions.concat(&list, self.ctx);
                        self.states[id].edges[i].actions = actions;
                    }
                }
            }
        }

        if !re.exit_actions().is_empty() {
            let list = self.intern(re.exit_actions());
            let end = self.add_state();
            self.states[frag.end].edges.push(Edge {
                label: Label::Epsilon,
                target: end,
                actions: list,
                guard: Guard::none(),
            });
            frag.end = end;
        }

        if !re.enter_actions().is_empty() || re.precondition().is_some() {
            let list = self.intern(re.enter_actions());
            let guard = match re.precondition() {
                None => Guard::none(),
                Some(name) => match self.ctx.lookup_precondition(name) {
                    None => return Err(Error::unknown_precondition(name)),
                    Some(id) => Guard::require(id),
                },
            };
            let start = self.add_state();
            self.states[start].edges.push(Edge {
                label: Label::Epsilon,
                target: frag.start,
                actions: list,
                guard,
            });
            frag.start = start;
        }

        Ok(frag)
    }

    /// Intersection and difference go through DFAs: both operands are
    /// determinized, the product is taken, and the product is re-imported
    /// as an NFA fragment so it composes with the surrounding expression.
    /// The left operand keeps its actions; the right operand contributes
    /// language only.
    fn build_product(
        &mut self,
        left: &Regex,
        right: &Regex,
        diff: bool,
    ) -> Result<Fragment> {
        let lnfa = NFA::compile(left, self.ctx, self.config)?;
        let rnfa = NFA::compile(right, self.ctx, self.config)?;
        let ldfa = determinize::determinize(&lnfa, self.ctx, self.config)
            .map_err(|err| err.for_pattern(left))?;
        let rdfa = determinize::determinize(&rnfa, self.ctx, self.config)
            .map_err(|err| err.for_pattern(right))?;
        let product =
            determinize::product(&ldfa, &rdfa, diff, self.ctx, self.config)?;
        Ok(self.import_dfa(&product))
    }

    /// Re-import a DFA as an NFA fragment: one fresh state per DFA state,
    /// byte edges copied verbatim, and an epsilon edge carrying the EOF
    /// actions from each accepting state to a fresh exit state.
    fn import_dfa(&mut self, dfa: &DFA) -> Fragment {
        let base = self.states.len();
        for _ in 0..dfa.len() {
            self.add_state();
        }
        let end = self.add_state();
        for id in 0..dfa.len() {
            let state = dfa.state(id);
            for edge in &state.edges {
                self.states[base + id].edges.push(Edge {
                    label: Label::Bytes(edge.bytes),
                    target: base + edge.target,
                    actions: edge.actions.clone(),
                    guard: edge.guard.clone(),
                });
            }
            if state.accept {
                self.states[base + id].edges.push(Edge {
                    label: Label::Epsilon,
                    target: end,
                    actions: state.eof_actions.clone(),
                    guard: Guard::none(),
                });
            }
        }
        Fragment { start: base + dfa.start(), end }
    }

    fn intern(&mut self, names: &[String]) -> ActionList {
        let ids = names.iter().map(|name| self.ctx.intern_action(name)).collect();
        ActionList::from_ids(ids, self.ctx)
    }

    fn add_state(&mut self) -> StateID {
        let id = self.states.len();
        self.states.push(State::default());
        id
    }

    fn add_epsilon(&mut self, from: StateID, to: StateID) {
        self.states[from].edges.push(Edge {
            label: Label::Epsilon,
            target: to,
            actions: ActionList::empty(),
            guard: Guard::none(),
        });
    }
}

impl fmt::Debug for NFA {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (id, state) in self.states.iter().enumerate() {
            let mut status = vec![b' ', b' '];
            if id == self.start {
                status[0] = b'>';
            }
            if id == self.accept {
                status[1] = b'*';
            }
            write!(f, "{}{:04}:", String::from_utf8(status).unwrap(), id)?;
            for edge in &state.edges {
                match edge.label {
                    Label::Epsilon => write!(f, " eps => {}", edge.target)?,
                    Label::Bytes(ref set) => {
                        write!(f, " {:?} => {}", set, edge.target)?
                    }
                }
                if !edge.actions.is_empty() {
                    write!(f, " {:?}", edge.actions)?;
                }
                if !edge.guard.is_none() {
                    write!(f, " {:?}", edge.guard)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Config;

    fn compile(re: &Regex) -> NFA {
        let mut ctx = Context::new();
        NFA::compile(re, &mut ctx, &Config::new()).unwrap()
    }

    #[test]
    fn symbol_is_two_states_one_edge() {
        let nfa = compile(&Regex::byte(b'a'));
        assert_eq!(nfa.len(), 2);
        assert_eq!(nfa.state(nfa.start()).edges.len(), 1);
        assert!(nfa.state(nfa.accept()).edges.is_empty());
    }

    #[test]
    fn empty_symbol_is_rejected() {
        let re = Regex::symbol(ByteSet::empty());
        let mut ctx = Context::new();
        assert!(NFA::compile(&re, &mut ctx, &Config::new()).is_err());
    }

    #[test]
    fn enter_annotation_adds_guarded_entry() {
        let mut ctx = Context::new();
        ctx.declare_precondition("ready");
        let re = Regex::byte(b'a').on_enter(["in"]).when("ready");
        let nfa = NFA::compile(&re, &mut ctx, &Config::new()).unwrap();
        let entry = &nfa.state(nfa.start()).edges[0];
        assert!(entry.is_epsilon());
        assert_eq!(entry.actions.len(), 1);
        assert!(!entry.guard.is_none());
    }

    #[test]
    fn unknown_precondition_is_rejected() {
        let re = Regex::byte(b'a').when("missing");
        let mut ctx = Context::new();
        assert!(NFA::compile(&re, &mut ctx, &Config::new()).is_err());
    }

    #[test]
    fn final_actions_attach_to_last_byte_edges() {
        let re = Regex::parse("ab").unwrap().on_final(["done"]);
        let nfa = compile(&re);
        let mut on_byte_edges = 0;
        for id in 0..nfa.len() {
            for edge in &nfa.state(id).edges {
                if !edge.is_epsilon() && !edge.actions.is_empty() {
                    assert_eq!(edge.target, nfa.accept());
                    on_byte_edges += 1;
                }
            }
        }
        assert_eq!(on_byte_edges, 1);
    }
}
