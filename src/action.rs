use std::cmp;
use std::collections::HashMap;
use std::fmt;

/// Identifies a declared action within one compilation context.
pub type ActionId = usize;

/// Identifies a declared precondition within one compilation context.
pub type PrecondId = usize;

/// A named action with an integer priority.
///
/// Actions are opaque to the compiler; it only ever schedules them. When two
/// otherwise coincident actions compete for the same transition, the one
/// with the larger priority wins. Priority ties are broken toward the later
/// declaration, which is what gives a tokenizer its "highest index wins"
/// rule for free.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Action {
    name: String,
    priority: i32,
}

impl Action {
    /// The name of this action.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The priority of this action.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// The registry of actions and preconditions for one compilation.
///
/// A context is local to a compilation request; there is no process-wide
/// registry. Action names used in annotations without a prior declaration
/// are registered on the fly with priority `0`. Precondition names, in
/// contrast, must be declared up front; referencing an undeclared one is a
/// compile error.
#[derive(Clone, Debug, Default)]
pub struct Context {
    actions: Vec<Action>,
    actions_by_name: HashMap<String, ActionId>,
    preconds: Vec<String>,
    preconds_by_name: HashMap<String, PrecondId>,
}

impl Context {
    /// Create an empty context.
    pub fn new() -> Context {
        Context::default()
    }

    /// Declare an action with the given priority, returning its id.
    ///
    /// Declaring a name that already exists updates its priority in place
    /// and returns the existing id.
    pub fn declare_action(&mut self, name: &str, priority: i32) -> ActionId {
        if let Some(&id) = self.actions_by_name.get(name) {
            self.actions[id].priority = priority;
            return id;
        }
        let id = self.actions.len();
        self.actions.push(Action { name: name.to_string(), priority });
        self.actions_by_name.insert(name.to_string(), id);
        id
    }

    /// Declare a precondition name, returning its id. Redeclaration returns
    /// the existing id.
    pub fn declare_precondition(&mut self, name: &str) -> PrecondId {
        if let Some(&id) = self.preconds_by_name.get(name) {
            return id;
        }
        let id = self.preconds.len();
        self.preconds.push(name.to_string());
        self.preconds_by_name.insert(name.to_string(), id);
        id
    }

    /// Look up an action by name, registering it with priority `0` if it
    /// has not been declared.
    pub(crate) fn intern_action(&mut self, name: &str) -> ActionId {
        if let Some(&id) = self.actions_by_name.get(name) {
            return id;
        }
        self.declare_action(name, 0)
    }

    pub(crate) fn lookup_precondition(&self, name: &str) -> Option<PrecondId> {
        self.preconds_by_name.get(name).copied()
    }

    /// Return the action with the given id.
    pub fn action(&self, id: ActionId) -> &Action {
        &self.actions[id]
    }

    /// Return the name of the precondition with the given id.
    pub fn precondition(&self, id: PrecondId) -> &str {
        &self.preconds[id]
    }

    /// The number of declared actions.
    pub fn action_len(&self) -> usize {
        self.actions.len()
    }

    /// The number of declared preconditions.
    pub fn precondition_len(&self) -> usize {
        self.preconds.len()
    }

    pub(crate) fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub(crate) fn preconditions(&self) -> &[String] {
        &self.preconds
    }
}

/// An ordered list of action ids.
///
/// A list is always kept in firing order: priority descending, then
/// declaration order ascending. Every transition in every automaton stage
/// carries one of these, so keeping the canonical order here means no later
/// pass ever has to re-sort.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ActionList(Vec<ActionId>);

impl ActionList {
    /// Create an empty list.
    pub fn empty() -> ActionList {
        ActionList(Vec::new())
    }

    /// Returns true if and only if this list contains no actions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of actions in this list.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the action ids in firing order.
    pub fn iter(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.0.iter().copied()
    }

    /// Returns the ids in firing order as a slice.
    pub fn as_slice(&self) -> &[ActionId] {
        &self.0
    }

    /// Return the concatenation of this list and `other`, renormalized into
    /// firing order. Duplicate ids collapse; the positional sets an
    /// annotation carries are sets of names, so one action never fires
    /// twice for one byte.
    pub(crate) fn concat(&self, other: &ActionList, ctx: &Context) -> ActionList {
        let mut ids = self.0.clone();
        ids.extend_from_slice(&other.0);
        ActionList::from_ids(ids, ctx)
    }

    pub(crate) fn from_ids(mut ids: Vec<ActionId>, ctx: &Context) -> ActionList {
        ids.sort_by_key(|&id| (cmp::Reverse(ctx.action(id).priority()), id));
        ids.dedup();
        ActionList(ids)
    }

    /// Returns true if this list wins a conflict against `other`.
    ///
    /// The winner is the list whose best (priority, declaration index) pair
    /// is larger; priority compares first and later declarations win ties.
    /// An empty list always loses to a non-empty one.
    pub(crate) fn beats(&self, other: &ActionList, ctx: &Context) -> bool {
        let key = |list: &ActionList| {
            list.0
                .iter()
                .map(|&id| (ctx.action(id).priority(), id))
                .max()
        };
        key(self) > key(other)
    }

    /// The first action in this list whose name differs from every name in
    /// `other`, used for naming the two sides of an ambiguity.
    pub(crate) fn distinguishing(&self, other: &ActionList) -> Option<ActionId> {
        self.0.iter().copied().find(|id| !other.0.contains(id))
    }
}

impl fmt::Debug for ActionList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

/// A conjunction of precondition literals guarding a transition.
///
/// Each literal pairs a precondition id with the boolean value it must
/// evaluate to for the transition to be taken. Negative literals arise when
/// determinization splits a byte over the valuations of the preconditions
/// present on it. An empty guard is always satisfied.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Guard(Vec<(PrecondId, bool)>);

impl Guard {
    /// Create the trivially-true guard.
    pub fn none() -> Guard {
        Guard(Vec::new())
    }

    /// Create a guard requiring the single precondition to hold.
    pub fn require(precond: PrecondId) -> Guard {
        Guard(vec![(precond, true)])
    }

    /// Create a guard from explicit literals. Duplicates collapse; the
    /// caller must not pass contradictory literals.
    pub(crate) fn from_literals(mut lits: Vec<(PrecondId, bool)>) -> Guard {
        lits.sort();
        lits.dedup();
        Guard(lits)
    }

    /// Returns true if and only if this guard has no literals.
    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the `(precondition, expected)` literals.
    pub fn literals(&self) -> impl Iterator<Item = (PrecondId, bool)> + '_ {
        self.0.iter().copied()
    }

    /// The distinct precondition ids mentioned by this guard.
    pub(crate) fn precond_ids(&self) -> impl Iterator<Item = PrecondId> + '_ {
        self.0.iter().map(|&(id, _)| id)
    }

    /// Conjoin this guard with another. Returns `None` when the two guards
    /// contradict each other (some precondition is required both true and
    /// false), in which case the transition is infeasible.
    pub(crate) fn and(&self, other: &Guard) -> Option<Guard> {
        let mut lits = self.0.clone();
        for &lit in &other.0 {
            match lits.iter().find(|&&(id, _)| id == lit.0) {
                Some(&(_, value)) if value != lit.1 => return None,
                Some(_) => {}
                None => lits.push(lit),
            }
        }
        lits.sort();
        Some(Guard(lits))
    }

    /// Returns true if this guard is satisfied by the given valuation,
    /// where `eval` maps a precondition id to its current truth value.
    pub(crate) fn satisfied_by(&self, mut eval: impl FnMut(PrecondId) -> bool) -> bool {
        self.0.iter().all(|&(id, value)| eval(id) == value)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "Guard(true)");
        }
        write!(f, "Guard(")?;
        for (i, &(id, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            if !value {
                write!(f, "!")?;
            }
            write!(f, "p{}", id)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firing_order_is_priority_then_declaration() {
        let mut ctx = Context::new();
        let low = ctx.declare_action("low", 1);
        let high = ctx.declare_action("high", 9);
        let tie = ctx.declare_action("tie", 9);

        let list = ActionList::from_ids(vec![low, tie, high], &ctx);
        assert_eq!(list.as_slice(), &[high, tie, low]);
    }

    #[test]
    fn higher_priority_beats() {
        let mut ctx = Context::new();
        let a = ctx.declare_action("a", 1);
        let b = ctx.declare_action("b", 2);
        let la = ActionList::from_ids(vec![a], &ctx);
        let lb = ActionList::from_ids(vec![b], &ctx);
        assert!(lb.beats(&la, &ctx));
        assert!(!la.beats(&lb, &ctx));
        assert!(la.beats(&ActionList::empty(), &ctx));
    }

    #[test]
    fn later_declaration_beats_on_tie() {
        let mut ctx = Context::new();
        let a = ctx.declare_action("a", 3);
        let b = ctx.declare_action("b", 3);
        let la = ActionList::from_ids(vec![a], &ctx);
        let lb = ActionList::from_ids(vec![b], &ctx);
        assert!(lb.beats(&la, &ctx));
    }

    #[test]
    fn guard_conjunction_detects_contradiction() {
        let g1 = Guard::require(0);
        let g2 = Guard(vec![(0, false)]);
        assert!(g1.and(&g2).is_none());
        assert_eq!(g1.and(&Guard::none()), Some(g1.clone()));
    }
}
