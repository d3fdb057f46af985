use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::action::{ActionList, Context, Guard, PrecondId};
use crate::byteset::ByteClasses;
use crate::compile::Config;
use crate::dfa::{self, DFA};
use crate::error::{Error, Result};
use crate::nfa::{self, NFA};

/// The maximum number of distinct preconditions tolerated on a single byte
/// of a single state. Each one doubles the number of transitions.
const MAX_GUARDS_PER_BYTE: usize = 4;

/// Convert an NFA into a DFA via subset construction, carrying action
/// lists and guards along.
pub(crate) fn determinize(
    nfa: &NFA,
    ctx: &Context,
    config: &Config,
) -> Result<DFA> {
    Determinizer::new(nfa, ctx, config).build()
}

/// One live NFA state inside a DFA state, paired with the actions and
/// guard literals accumulated over epsilon edges since the last consumed
/// byte. Pending actions fire on the next byte consumed, or at end of
/// input if this thread sits on the accepting state.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct Thread {
    state: nfa::StateID,
    actions: ActionList,
    guard: Guard,
}

/// A DFA state being built: a canonically ordered set of threads.
#[derive(Debug, Eq, Hash, PartialEq)]
struct BuilderState {
    threads: Vec<Thread>,
}

struct Determinizer<'a> {
    nfa: &'a NFA,
    ctx: &'a Context,
    config: &'a Config,
    dfa: DFA,
    /// Sets of NFA threads defining each DFA state being built.
    builder_states: Vec<Rc<BuilderState>>,
    /// A cache of DFA states that already exist, looked up by their
    /// ordered thread sets.
    cache: HashMap<Rc<BuilderState>, dfa::StateID>,
    /// A shortest input reaching each DFA state, for ambiguity witnesses.
    witnesses: Vec<Vec<u8>>,
    /// States whose transitions have not been computed yet.
    uncompiled: Vec<dfa::StateID>,
    classes: ByteClasses,
}

/// One NFA byte edge enabled from some thread on some byte: the actions
/// that would fire, the conjoined guard, and the edge's target.
struct Contribution {
    actions: ActionList,
    guard: Guard,
    target: nfa::StateID,
}

impl<'a> Determinizer<'a> {
    fn new(nfa: &'a NFA, ctx: &'a Context, config: &'a Config) -> Determinizer<'a> {
        let classes = ByteClasses::from_sets(nfa.byte_sets());
        Determinizer {
            nfa,
            ctx,
            config,
            dfa: DFA::empty(),
            builder_states: Vec::new(),
            cache: HashMap::new(),
            witnesses: Vec::new(),
            uncompiled: Vec::new(),
            classes,
        }
    }

    fn build(mut self) -> Result<DFA> {
        let start_seed = vec![Thread {
            state: self.nfa.start(),
            actions: ActionList::empty(),
            guard: Guard::none(),
        }];
        let start = self.cached_state(start_seed, &[])?;
        self.dfa.set_start(start);
        while let Some(dfa_id) = self.uncompiled.pop() {
            self.compute_transitions(dfa_id)?;
        }
        debug!(
            "determinized {} NFA states into {} DFA states",
            self.nfa.len(),
            self.dfa.len(),
        );
        Ok(self.dfa)
    }

    fn compute_transitions(&mut self, dfa_id: dfa::StateID) -> Result<()> {
        let threads = Rc::clone(&self.builder_states[dfa_id]);
        let reps: Vec<u8> = self.classes.representatives().collect();
        for rep in reps {
            let mut contribs = Vec::new();
            for thread in &threads.threads {
                for edge in &self.nfa.state(thread.state).edges {
                    match edge.byte_set() {
                        Some(set) if set.contains(rep) => {}
                        _ => continue,
                    }
                    let guard = match thread.guard.and(&edge.guard) {
                        None => continue,
                        Some(guard) => guard,
                    };
                    contribs.push(Contribution {
                        actions: thread.actions.concat(&edge.actions, self.ctx),
                        guard,
                        target: edge.target,
                    });
                }
            }
            if contribs.is_empty() {
                continue;
            }
            self.add_transitions(dfa_id, rep, &contribs)?;
        }
        Ok(())
    }

    /// Turn the contributions for one byte into DFA edges, one per
    /// valuation of the preconditions present on that byte.
    fn add_transitions(
        &mut self,
        dfa_id: dfa::StateID,
        rep: u8,
        contribs: &[Contribution],
    ) -> Result<()> {
        let mut preconds: Vec<PrecondId> =
            contribs.iter().flat_map(|c| c.guard.precond_ids()).collect();
        preconds.sort();
        preconds.dedup();
        if preconds.len() > MAX_GUARDS_PER_BYTE {
            return Err(Error::too_many_guards(
                preconds.len(),
                MAX_GUARDS_PER_BYTE,
            ));
        }

        let mut witness = self.witnesses[dfa_id].clone();
        witness.push(rep);

        let mut outcomes = Vec::new();
        for bits in 0u32..(1 << preconds.len()) {
            let valuation = |id: PrecondId| -> bool {
                let i = preconds.iter().position(|&p| p == id).unwrap();
                bits & (1 << i) != 0
            };
            let enabled: Vec<&Contribution> = contribs
                .iter()
                .filter(|c| c.guard.satisfied_by(valuation))
                .collect();
            if enabled.is_empty() {
                continue;
            }

            let mut winner = &enabled[0].actions;
            for c in &enabled[1..] {
                if c.actions == *winner {
                    continue;
                }
                if self.config.is_unambiguous() {
                    return Err(ambiguity(&c.actions, winner, &witness, self.ctx));
                }
                if c.actions.beats(winner, self.ctx) {
                    winner = &c.actions;
                }
            }

            let mut seeds: Vec<Thread> = enabled
                .iter()
                .map(|c| Thread {
                    state: c.target,
                    actions: ActionList::empty(),
                    guard: Guard::none(),
                })
                .collect();
            seeds.sort();
            seeds.dedup();

            let literals: Vec<(PrecondId, bool)> = preconds
                .iter()
                .enumerate()
                .map(|(i, &p)| (p, bits & (1 << i) != 0))
                .collect();
            outcomes.push((literals, winner.clone(), seeds));
        }

        // When every valuation agrees, the preconditions do not actually
        // discriminate on this byte and the guard can be dropped.
        let uniform = !preconds.is_empty()
            && outcomes.len() == (1 << preconds.len())
            && outcomes.windows(2).all(|w| w[0].1 == w[1].1 && w[0].2 == w[1].2);
        if uniform {
            let (_, actions, seeds) = outcomes.pop().unwrap();
            outcomes.clear();
            outcomes.push((Vec::new(), actions, seeds));
        }

        for (literals, actions, seeds) in outcomes {
            let target = self.cached_state(seeds, &witness)?;
            self.dfa.state_mut(dfa_id).add_edge(dfa::Edge {
                bytes: self.classes.elements(rep),
                guard: Guard::from_literals(literals),
                target,
                actions,
            });
        }
        Ok(())
    }

    /// Compute the epsilon closure of the given seed threads and return
    /// the id of the corresponding DFA state, creating it if new.
    fn cached_state(
        &mut self,
        seeds: Vec<Thread>,
        witness: &[u8],
    ) -> Result<dfa::StateID> {
        let threads = self.closure(seeds, witness)?;
        let state = BuilderState { threads };
        if let Some(&cached_id) = self.cache.get(&state) {
            return Ok(cached_id);
        }
        if self.builder_states.len() >= self.config.limit() {
            return Err(Error::too_many_states(
                self.config.limit(),
                String::new(),
            ));
        }

        let id = self.dfa.add_state();
        self.fill_accept(id, &state, witness)?;
        let rc = Rc::new(state);
        self.builder_states.push(Rc::clone(&rc));
        self.cache.insert(rc, id);
        self.witnesses.push(witness.to_vec());
        self.uncompiled.push(id);
        Ok(id)
    }

    /// Mark the new state accepting if one of its threads sits on the NFA
    /// accepting state, and record that thread's pending actions as the
    /// state's EOF actions. Guards accumulated on the way to the accepting
    /// state have no transition left to gate and are ignored here.
    fn fill_accept(
        &mut self,
        id: dfa::StateID,
        state: &BuilderState,
        witness: &[u8],
    ) -> Result<()> {
        let mut eof: Option<&ActionList> = None;
        for thread in &state.threads {
            if thread.state != self.nfa.accept() {
                continue;
            }
            match eof {
                None => eof = Some(&thread.actions),
                Some(current) if *current == thread.actions => {}
                Some(current) => {
                    if self.config.is_unambiguous() {
                        return Err(ambiguity(
                            &thread.actions,
                            current,
                            witness,
                            self.ctx,
                        ));
                    }
                    if thread.actions.beats(current, self.ctx) {
                        eof = Some(&thread.actions);
                    }
                }
            }
        }
        if let Some(eof) = eof {
            let eof = eof.clone();
            let state = self.dfa.state_mut(id);
            state.accept = true;
            state.eof_actions = eof;
        }
        Ok(())
    }

    /// Expand the seed threads over epsilon edges, accumulating actions
    /// and guard literals. Reaching one NFA state twice under the same
    /// guard with different pending actions is the ambiguity condition.
    fn closure(
        &self,
        seeds: Vec<Thread>,
        witness: &[u8],
    ) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = Vec::new();
        let mut stack = seeds;
        while let Some(thread) = stack.pop() {
            let existing = threads
                .iter()
                .position(|t| t.state == thread.state && t.guard == thread.guard);
            match existing {
                Some(i) if threads[i].actions == thread.actions => continue,
                Some(i) => {
                    if self.config.is_unambiguous() {
                        return Err(ambiguity(
                            &thread.actions,
                            &threads[i].actions,
                            witness,
                            self.ctx,
                        ));
                    }
                    if !thread.actions.beats(&threads[i].actions, self.ctx) {
                        continue;
                    }
                    // The winner's pending actions must flow onward, so the
                    // thread is re-expanded below with its new actions.
                    threads[i].actions = thread.actions.clone();
                }
                None => threads.push(thread.clone()),
            }
            for edge in &self.nfa.state(thread.state).edges {
                if !edge.is_epsilon() {
                    continue;
                }
                let guard = match thread.guard.and(&edge.guard) {
                    None => continue,
                    Some(guard) => guard,
                };
                stack.push(Thread {
                    state: edge.target,
                    actions: thread.actions.concat(&edge.actions, self.ctx),
                    guard,
                });
            }
        }
        threads.sort();
        Ok(threads)
    }
}

fn ambiguity(
    left: &ActionList,
    right: &ActionList,
    witness: &[u8],
    ctx: &Context,
) -> Error {
    let name = |list: &ActionList, other: &ActionList| {
        list.distinguishing(other)
            .map(|id| ctx.action(id).name().to_string())
            .unwrap_or_else(|| "<no action>".to_string())
    };
    Error::ambiguous(name(left, right), name(right, left), witness.to_vec())
}

/// The product construction over two DFAs. `A & B` accepts inputs in both
/// languages; `A \ B` accepts inputs in `A` but not in `B`. The left
/// operand keeps its actions and EOF actions; the right operand only
/// filters the language.
pub(crate) fn product(
    left: &DFA,
    right: &DFA,
    diff: bool,
    _ctx: &Context,
    config: &Config,
) -> Result<DFA> {
    // For difference the right side must be total, so it is completed with
    // an implicit dead sink, represented as `None`.
    type Pair = (dfa::StateID, Option<dfa::StateID>);

    let mut out = DFA::empty();
    let mut map: HashMap<Pair, dfa::StateID> = HashMap::new();
    let mut worklist: Vec<Pair> = Vec::new();

    let start: Pair = (left.start(), Some(right.start()));
    let start_id = out.add_state();
    map.insert(start, start_id);
    worklist.push(start);
    out.set_start(start_id);

    while let Some(pair) = worklist.pop() {
        let out_id = map[&pair];
        let (lid, rid) = pair;
        let lstate = left.state(lid);

        let right_accepts =
            rid.map(|rid| right.state(rid).accept).unwrap_or(false);
        let accept =
            lstate.accept && if diff { !right_accepts } else { right_accepts };
        if accept {
            let state = out.state_mut(out_id);
            state.accept = true;
            state.eof_actions = lstate.eof_actions.clone();
        }

        let mut pending: Vec<(dfa::Edge, Pair)> = Vec::new();
        for ledge in &lstate.edges {
            // Bytes the right side also moves on.
            let mut uncovered = ledge.bytes;
            if let Some(rid) = rid {
                for redge in &right.state(rid).edges {
                    let bytes = ledge.bytes.intersect(&redge.bytes);
                    if bytes.is_empty() {
                        continue;
                    }
                    uncovered = uncovered.difference(&redge.bytes);
                    let guard = match ledge.guard.and(&redge.guard) {
                        None => continue,
                        Some(guard) => guard,
                    };
                    let next = (ledge.target, Some(redge.target));
                    pending.push((
                        dfa::Edge {
                            bytes,
                            guard,
                            target: 0,
                            actions: ledge.actions.clone(),
                        },
                        next,
                    ));
                }
            }
            // Bytes the right side cannot move on lead into its dead sink,
            // which only matters for difference.
            if diff && !uncovered.is_empty() {
                pending.push((
                    dfa::Edge {
                        bytes: uncovered,
                        guard: ledge.guard.clone(),
                        target: 0,
                        actions: ledge.actions.clone(),
                    },
                    (ledge.target, None),
                ));
            }
        }

        for (mut edge, next) in pending {
            let next_id = match map.get(&next) {
                Some(&id) => id,
                None => {
                    if map.len() >= config.limit() {
                        return Err(Error::too_many_states(
                            config.limit(),
                            String::new(),
                        ));
                    }
                    let id = out.add_state();
                    map.insert(next, id);
                    worklist.push(next);
                    id
                }
            };
            edge.target = next_id;
            out.state_mut(out_id).add_edge(edge);
        }
    }

    debug!(
        "product of {} x {} DFA states has {} states",
        left.len(),
        right.len(),
        out.len(),
    );
    Ok(out)
}
