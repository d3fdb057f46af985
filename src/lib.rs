/*!
A compiler from a regex algebra with semantic actions to deterministic
state machines, and from there to matcher source code.

The pipeline has four stages. A [`Regex`] — built programmatically or
parsed from a pattern string — may carry *action* annotations (enter,
final, exit, all) and *precondition* guards on any node. Thompson
expansion turns it into an NFA whose edges carry the action names, subset
construction determinizes it while preserving when each action fires,
partition refinement minimizes the result, and the dense renumbered
[`Machine`] that falls out can either be executed directly or handed to
[`emit`] to produce matcher code in one of two strategies (a transition
table or direct dispatch).

Determinization is worst-case exponential; a configurable state limit
turns pathological patterns into errors. When a machine is compiled in
unambiguous mode, any two actions competing for one transition fail
compilation with a witness input; otherwise the higher priority action
wins, with ties going to the later declaration.

# Example: validation

```
use regex_machine::{compile, Config, Context, Regex};

let re = Regex::parse("a(bc)*|def|x+").unwrap();
let machine = compile(&re, &mut Context::new(), &Config::new()).unwrap();

assert!(machine.is_match(b"abcbcbc"));
assert!(machine.is_match(b"def"));
let err = machine.validate(b"abcabc").unwrap_err();
assert_eq!(err.position(), 4);
```

# Example: actions

```
use regex_machine::{compile, Config, Context, Recorder, Regex};

let mut ctx = Context::new();
let re = Regex::parse("ab").unwrap().on_enter(["begin"]).on_exit(["done"]);
let machine = compile(&re, &mut ctx, &Config::new()).unwrap();

let mut rec = Recorder::new();
machine.run(b"ab", &mut rec);
assert_eq!(rec.fired, vec!["begin".to_string(), "done".to_string()]);
```

Tokenization over a rule list, with longest-match semantics and
priority-based tie breaking, is built on the same machinery; see
[`Tokenizer`].
*/

#![deny(missing_docs)]

pub use crate::{
    action::{Action, ActionId, ActionList, Context, Guard, PrecondId},
    byteset::{
        ByteClassRepresentatives, ByteClasses, ByteSet, Bytes, Ranges,
    },
    codegen::{emit, Backend, CodeGenContext},
    compile::{compile, Config},
    error::{Error, ErrorKind, Result},
    machine::{Edge, Machine, START},
    matcher::{Driver, InputError, Mark, Outcome, Recorder},
    regex::{Regex, RegexKind},
    tokenizer::{Tokenizer, Tokens},
};

mod action;
mod byteset;
mod codegen;
mod compile;
mod determinize;
mod dfa;
mod error;
mod machine;
mod matcher;
mod minimize;
mod nfa;
mod regex;
mod tokenizer;
