use crate::action::Context;
use crate::determinize;
use crate::error::{Error, Result};
use crate::machine::Machine;
use crate::minimize;
use crate::nfa::NFA;
use crate::regex::{Regex, RegexKind};

/// Configuration for compiling a regex into a machine.
///
/// The setters use the builder pattern:
///
/// ```
/// use regex_machine::{compile, Config, Context, Regex};
///
/// let re = Regex::parse("a+").unwrap();
/// let mut config = Config::new();
/// config.unambiguous(true).minimize(false);
/// let machine = compile(&re, &mut Context::new(), &config).unwrap();
/// assert!(machine.state_count() > 0);
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    unambiguous: bool,
    minimize: bool,
    byte_classes: bool,
    state_limit: usize,
}

impl Config {
    /// Create a configuration with the defaults: ambiguous mode, minimized
    /// machines, alphabet compression on, and a ten thousand state limit.
    pub fn new() -> Config {
        Config {
            unambiguous: false,
            minimize: true,
            byte_classes: true,
            state_limit: 10_000,
        }
    }

    /// Require the machine to be free of action conflicts.
    ///
    /// When enabled, compilation fails if two distinct action lists could
    /// fire on the same transition, naming the conflicting actions and a
    /// witness input. When disabled, such conflicts resolve toward the
    /// higher priority action, with ties going to the later declaration.
    ///
    /// This is disabled by default.
    pub fn unambiguous(&mut self, yes: bool) -> &mut Config {
        self.unambiguous = yes;
        self
    }

    /// Minimize the machine.
    ///
    /// When enabled, equivalent states are merged after determinization,
    /// producing the smallest machine with the same behavior. Minimization
    /// costs extra compile time proportional to the square of the state
    /// count, which is usually worth it for machines that are emitted as
    /// code.
    ///
    /// This is enabled by default.
    pub fn minimize(&mut self, yes: bool) -> &mut Config {
        self.minimize = yes;
        self
    }

    /// Shrink the machine's alphabet by mapping bytes to equivalence
    /// classes.
    ///
    /// Two bytes share a class when no transition anywhere distinguishes
    /// them. A table-driven matcher indexed by class instead of by byte is
    /// substantially smaller; the cost is one extra lookup per input byte.
    ///
    /// This is enabled by default.
    pub fn byte_classes(&mut self, yes: bool) -> &mut Config {
        self.byte_classes = yes;
        self
    }

    /// Cap the number of DFA states subset construction may create before
    /// giving up. Determinization is worst-case exponential; the limit
    /// turns a pathological pattern into an error instead of a hang.
    ///
    /// The default is `10_000`.
    pub fn state_limit(&mut self, limit: usize) -> &mut Config {
        self.state_limit = limit;
        self
    }

    pub(crate) fn is_unambiguous(&self) -> bool {
        self.unambiguous
    }

    pub(crate) fn do_minimize(&self) -> bool {
        self.minimize
    }

    pub(crate) fn uses_byte_classes(&self) -> bool {
        self.byte_classes
    }

    pub(crate) fn limit(&self) -> usize {
        self.state_limit
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

/// Compile a regex into an executable machine.
///
/// Action names used by the regex are interned into the context,
/// registering any that were not declared with priority `0`. Precondition
/// names must have been declared beforehand.
///
/// # Example
///
/// ```
/// use regex_machine::{compile, Config, Context, Regex};
///
/// let re = Regex::parse("a(bc)*").unwrap();
/// let machine = compile(&re, &mut Context::new(), &Config::new()).unwrap();
/// assert!(machine.validate(b"abcbc").is_ok());
/// assert!(machine.validate(b"ab").is_err());
/// ```
pub fn compile(re: &Regex, ctx: &mut Context, config: &Config) -> Result<Machine> {
    validate(re, ctx)?;
    let nfa = NFA::compile(re, ctx, config)?;
    let dfa = determinize::determinize(&nfa, ctx, config)
        .map_err(|err| err.for_pattern(re))?;
    let dfa = if config.do_minimize() { minimize::minimize(&dfa) } else { dfa };
    Ok(Machine::from_dfa(&dfa, ctx, config))
}

/// Fail fast on malformed input before any automaton work starts.
fn validate(re: &Regex, ctx: &Context) -> Result<()> {
    if let Some(name) = re.precondition() {
        if ctx.lookup_precondition(name).is_none() {
            return Err(Error::unknown_precondition(name));
        }
    }
    match *re.kind() {
        RegexKind::Empty => Ok(()),
        RegexKind::Symbol(ref set) => {
            if set.is_empty() {
                Err(Error::empty_byte_set())
            } else {
                Ok(())
            }
        }
        RegexKind::Concat(ref children) => {
            children.iter().try_for_each(|child| validate(child, ctx))
        }
        RegexKind::Alt(ref a, ref b)
        | RegexKind::And(ref a, ref b)
        | RegexKind::Diff(ref a, ref b) => {
            validate(a, ctx)?;
            validate(b, ctx)
        }
        RegexKind::Rep(ref inner) => validate(inner, ctx),
    }
}
