use std::fmt;

use crate::byteset::{escape, escape_bytes, ByteSet};
use crate::machine::{Machine, START};

/// Callbacks a machine execution is driven against.
///
/// The interpreter in this module defines the semantics that both emitted
/// matcher backends reproduce: it fires actions through [`Driver::action`]
/// in list order before a transition completes, and consults
/// [`Driver::precondition`] for every guard literal on a candidate edge.
pub trait Driver {
    /// Called for each action fired, in firing order.
    fn action(&mut self, name: &str);

    /// Evaluate the named precondition. Defaults to `true`, which makes
    /// every guarded transition eligible.
    fn precondition(&mut self, name: &str) -> bool {
        let _ = name;
        true
    }
}

/// A driver that ignores all actions.
impl Driver for () {
    fn action(&mut self, _: &str) {}
}

/// A driver that records the names of fired actions, in order.
#[derive(Debug, Default)]
pub struct Recorder {
    /// The names of every action fired so far, oldest first.
    pub fired: Vec<String>,
}

impl Recorder {
    /// Create a recorder with no fired actions.
    pub fn new() -> Recorder {
        Recorder::default()
    }
}

impl Driver for Recorder {
    fn action(&mut self, name: &str) {
        self.fired.push(name.to_string());
    }
}

/// The result of running a machine over a buffer: the final values of the
/// `cs` and `p` protocol variables.
///
/// * `cs == 0` means the whole input was accepted.
/// * `cs > 0` means the input ended mid-match; `cs` is the resumable state.
/// * `cs < 0` means an input error: no transition matched at offset `p`,
///   and `-cs` identifies the state that rejected the byte.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Outcome {
    /// The final machine state, per the sign convention above.
    pub cs: i32,
    /// The final 1-indexed byte offset. On an input error this is the
    /// offset of the rejected byte; on success or EOF it is one past the
    /// last byte.
    pub p: usize,
}

impl Machine {
    /// Run this machine over the whole buffer, driving actions and
    /// preconditions through `driver`.
    ///
    /// This is the reference execution: the code emitted for this machine
    /// behaves identically, byte for byte and action for action.
    pub fn run<D: Driver>(&self, data: &[u8], driver: &mut D) -> Outcome {
        let mut cs: i32 = START as i32;
        let mut p: usize = 1;
        let p_end = data.len();
        'outer: while p <= p_end {
            let byte = data[p - 1];
            for edge in self.edges(cs as u32) {
                let (lo, hi) = edge.range();
                if byte < lo || byte > hi {
                    continue;
                }
                let pass = edge.guard().literals().all(|(id, expected)| {
                    driver.precondition(self.precondition_name(id)) == expected
                });
                if !pass {
                    continue;
                }
                for action in edge.actions().iter() {
                    driver.action(self.action_name(action));
                }
                cs = edge.target() as i32;
                p += 1;
                continue 'outer;
            }
            cs = -cs;
            break;
        }
        if cs > 0 && p > p_end {
            if let Some(eof) = self.eof_actions(cs as u32) {
                for action in eof.iter() {
                    driver.action(self.action_name(action));
                }
                cs = 0;
            }
        }
        Outcome { cs, p }
    }

    /// Returns true if and only if the machine accepts the whole buffer.
    pub fn is_match(&self, data: &[u8]) -> bool {
        self.validate(data).is_ok()
    }

    /// Check the whole buffer against this machine, returning a rendered
    /// error when it is rejected.
    ///
    /// A rejected byte reports the 1-indexed offset of that byte; input
    /// that ends mid-match reports the offset one past the final byte.
    pub fn validate(&self, data: &[u8]) -> Result<(), InputError> {
        let outcome = self.run(data, &mut ());
        if outcome.cs == 0 {
            return Ok(());
        }
        let state = outcome.cs.unsigned_abs();
        Err(InputError::new(self, data, state, outcome.p))
    }

    /// The length of the longest prefix of the buffer this machine
    /// accepts, if any prefix (including the empty one) is accepted.
    ///
    /// Preconditions are evaluated as `true`, the same default a run with
    /// the unit driver uses, so `find` and [`Machine::is_match`] always
    /// agree on which inputs are accepted.
    pub fn find(&self, data: &[u8]) -> Option<usize> {
        let mut cs = START;
        let mut last_match = if self.is_accept(cs) { Some(0) } else { None };
        for (i, &byte) in data.iter().enumerate() {
            let mut next = None;
            for edge in self.edges(cs) {
                let (lo, hi) = edge.range();
                let pass = edge.guard().literals().all(|(_, expected)| expected);
                if lo <= byte && byte <= hi && pass {
                    next = Some(edge.target());
                    break;
                }
            }
            match next {
                None => return last_match,
                Some(id) => cs = id,
            }
            if self.is_accept(cs) {
                last_match = Some(i + 1);
            }
        }
        last_match
    }
}

/// A rendered runtime input error: where the match failed, in which state,
/// and what would have been acceptable instead.
#[derive(Clone, Debug)]
pub struct InputError {
    position: usize,
    line: usize,
    column: usize,
    state: u32,
    expected: ByteSet,
    found: Option<u8>,
    window: Vec<u8>,
}

impl InputError {
    fn new(machine: &Machine, data: &[u8], state: u32, position: usize) -> InputError {
        let seen = &data[..(position - 1).min(data.len())];
        let window_start = seen.len().saturating_sub(16);
        let mut line = 1;
        let mut last_newline = 0;
        for (i, &b) in seen.iter().enumerate() {
            if b == b'\n' {
                line += 1;
                last_newline = i + 1;
            }
        }
        InputError {
            position,
            line,
            column: position - last_newline,
            state,
            expected: machine.expected_bytes(state),
            found: data.get(position - 1).copied(),
            window: seen[window_start..].to_vec(),
        }
    }

    /// The 1-indexed byte offset of the failure.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The 1-indexed line of the failure, counting `\n` terminators.
    pub fn line(&self) -> usize {
        self.line
    }

    /// The 1-indexed column of the failure within its line.
    pub fn column(&self) -> usize {
        self.column
    }

    /// The state that rejected the input.
    pub fn state(&self) -> u32 {
        self.state
    }

    /// The bytes that would have been accepted instead.
    pub fn expected(&self) -> &ByteSet {
        &self.expected
    }
}

impl std::error::Error for InputError {}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid input at byte {} (line {}, column {}): ",
            self.position, self.line, self.column,
        )?;
        match self.found {
            Some(b) => write!(f, "found {}", escape(b))?,
            None => write!(f, "input ended early")?,
        }
        if !self.window.is_empty() {
            write!(f, " after \"{}\"", escape_bytes(&self.window))?;
        }
        write!(f, "; state {} expects ", self.state)?;
        if self.expected.is_empty() {
            write!(f, "end of input")
        } else {
            write!(f, "{:?}", self.expected)
        }
    }
}

/// A pinned offset in a caller's buffer.
///
/// Streaming readers refill their buffer while a match is suspended; a
/// mark tells the refill logic which region is still referenced by the
/// match in progress and must survive compaction. `markpos` recovers the
/// marked offset so action bodies can slice the buffer relative to it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mark {
    offset: Option<usize>,
}

impl Mark {
    /// Create an unset mark.
    pub fn new() -> Mark {
        Mark::default()
    }

    /// Pin the given 1-indexed offset.
    pub fn mark(&mut self, p: usize) {
        self.offset = Some(p);
    }

    /// Release the pin.
    pub fn unmark(&mut self) {
        self.offset = None;
    }

    /// The pinned offset, if one is set.
    pub fn markpos(&self) -> Option<usize> {
        self.offset
    }

    /// Shift the pinned offset left by `amount` after the caller compacted
    /// its buffer by dropping `amount` leading bytes.
    pub fn compact(&mut self, amount: usize) {
        if let Some(ref mut offset) = self.offset {
            *offset -= amount.min(*offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Context;
    use crate::compile::{compile, Config};
    use crate::regex::Regex;

    fn machine(pattern: &str) -> Machine {
        let re = Regex::parse(pattern).unwrap();
        compile(&re, &mut Context::new(), &Config::new()).unwrap()
    }

    #[test]
    fn validate_reports_position_of_bad_byte() {
        let m = machine("abc");
        assert!(m.validate(b"abc").is_ok());
        let err = m.validate(b"abx").unwrap_err();
        assert_eq!(err.position(), 3);
        assert!(err.expected().contains(b'c'));
    }

    #[test]
    fn validate_reports_eof_one_past_end() {
        let m = machine("abc");
        let err = m.validate(b"ab").unwrap_err();
        assert_eq!(err.position(), 3);
        let err = m.validate(b"").unwrap_err();
        assert_eq!(err.position(), 1);
    }

    #[test]
    fn find_longest_prefix() {
        let m = machine("a+");
        assert_eq!(m.find(b"aaab"), Some(3));
        assert_eq!(m.find(b"b"), None);
        let m = machine("a*");
        assert_eq!(m.find(b"b"), Some(0));
    }

    #[test]
    fn actions_fire_in_order() {
        let mut ctx = Context::new();
        ctx.declare_action("first", 2);
        ctx.declare_action("second", 1);
        let re = Regex::byte(b'x').on_enter(["second", "first"]);
        let m = compile(&re, &mut ctx, &Config::new()).unwrap();
        let mut rec = Recorder::new();
        let outcome = m.run(b"x", &mut rec);
        assert_eq!(outcome.cs, 0);
        assert_eq!(rec.fired, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn guarded_edge_respects_precondition() {
        struct Flag(bool);
        impl Driver for Flag {
            fn action(&mut self, _: &str) {}
            fn precondition(&mut self, _: &str) -> bool {
                self.0
            }
        }

        let mut ctx = Context::new();
        ctx.declare_precondition("go");
        let re = Regex::byte(b'a').when("go");
        let m = compile(&re, &mut ctx, &Config::new()).unwrap();

        assert_eq!(m.run(b"a", &mut Flag(true)).cs, 0);
        let outcome = m.run(b"a", &mut Flag(false));
        assert!(outcome.cs < 0);
        assert_eq!(outcome.p, 1);
    }

    #[test]
    fn find_agrees_with_is_match_on_guarded_machines() {
        let mut ctx = Context::new();
        ctx.declare_precondition("go");
        let re = Regex::byte(b'a').when("go").rep1();
        let m = compile(&re, &mut ctx, &Config::new()).unwrap();

        assert!(m.is_match(b"aa"));
        assert_eq!(m.find(b"aa"), Some(2));
        assert_eq!(m.find(b"aab"), Some(2));
        assert_eq!(m.find(b"b"), None);
    }

    #[test]
    fn mark_tracks_compaction() {
        let mut mark = Mark::new();
        mark.mark(10);
        mark.compact(4);
        assert_eq!(mark.markpos(), Some(6));
        mark.unmark();
        assert_eq!(mark.markpos(), None);
    }
}
