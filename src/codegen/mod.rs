/*!
Emission of matcher source code for a compiled [`Machine`].

Two backends produce equivalent matchers against a fixed variable
protocol:

* `p` — current 1-indexed byte offset
* `p_end` — last valid offset
* `cs` — current state: positive while running, `0` after acceptance,
  negative on an input error with `-cs` naming the rejecting state
* `byte` — the byte being examined
* `data` — the input buffer (serving as both the pointer and length view)
* `is_eof` — whether the buffer currently ends the input

The caller owns these variables; the emitted code only reads and writes
them, so a streaming caller can refill `data`, flip `is_eof` and re-enter
the matcher with `cs` and `p` preserved. Action bodies are spliced
verbatim at the hook sites the backend chooses. `cs` is advanced before
the bodies run, so a body may overwrite it with a sentinel and the
matcher exits at the next state boundary; for an immediate exit, every
backend wraps its loop in a labeled block and `break` to that label is
the escape primitive.
*/

use std::collections::HashMap;

use proc_macro2::{Ident, Literal, Span, TokenStream};
use quote::quote;

use crate::action::{ActionList, Guard};
use crate::error::{Error, Result};
use crate::machine::{Edge, Machine};

mod goto;
mod table;

/// The matcher strategy to emit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backend {
    /// A transition table indexed by `(state, byte class)` with a small
    /// interpreter loop around it. Compact, cache friendly.
    Table,
    /// One dispatch arm per state with explicit branches on byte ranges.
    /// Typically faster, and the form streaming readers resume into.
    Goto,
}

/// Configuration for emitting matcher code.
///
/// At minimum, a body must be supplied for every action the machine can
/// fire and an expression for every precondition it can test. Everything
/// else has defaults.
///
/// ```
/// use quote::quote;
/// use regex_machine::{compile, emit, CodeGenContext, Config, Context, Regex};
///
/// let re = Regex::parse("ab*").unwrap().on_all(["tally"]);
/// let machine = compile(&re, &mut Context::new(), &Config::new()).unwrap();
///
/// let mut config = CodeGenContext::new();
/// config.action("tally", quote! { count += 1; });
/// let source = emit(&machine, &config).unwrap();
/// assert!(source.to_string().contains("count"));
/// ```
#[derive(Clone, Debug)]
pub struct CodeGenContext {
    backend: Backend,
    p: String,
    p_end: String,
    cs: String,
    byte: String,
    data: String,
    is_eof: String,
    escape: String,
    bounds_checks: bool,
    actions: HashMap<String, TokenStream>,
    preconds: HashMap<String, TokenStream>,
    init: Option<TokenStream>,
    on_loop: Option<TokenStream>,
    on_return: Option<TokenStream>,
    on_error: Option<TokenStream>,
}

impl CodeGenContext {
    /// Create a configuration with the default variable names, the goto
    /// backend, bounds checks on, and no action bodies.
    pub fn new() -> CodeGenContext {
        CodeGenContext {
            backend: Backend::Goto,
            p: "p".to_string(),
            p_end: "p_end".to_string(),
            cs: "cs".to_string(),
            byte: "byte".to_string(),
            data: "data".to_string(),
            is_eof: "is_eof".to_string(),
            escape: "resume".to_string(),
            bounds_checks: true,
            actions: HashMap::new(),
            preconds: HashMap::new(),
            init: None,
            on_loop: None,
            on_return: None,
            on_error: None,
        }
    }

    /// Select the backend. The default is [`Backend::Goto`].
    pub fn backend(&mut self, backend: Backend) -> &mut CodeGenContext {
        self.backend = backend;
        self
    }

    /// Emit indexed buffer reads with bounds checks. Disabling this uses
    /// `get_unchecked` and makes the emitted matcher `unsafe` code.
    ///
    /// This is enabled by default.
    pub fn bounds_checks(&mut self, yes: bool) -> &mut CodeGenContext {
        self.bounds_checks = yes;
        self
    }

    /// Supply the body spliced wherever the named action fires.
    pub fn action(&mut self, name: &str, body: TokenStream) -> &mut CodeGenContext {
        self.actions.insert(name.to_string(), body);
        self
    }

    /// Supply the boolean expression tested wherever the named
    /// precondition guards a transition.
    pub fn precondition(
        &mut self,
        name: &str,
        expr: TokenStream,
    ) -> &mut CodeGenContext {
        self.preconds.insert(name.to_string(), expr);
        self
    }

    /// Code spliced before the matcher loop.
    pub fn init(&mut self, body: TokenStream) -> &mut CodeGenContext {
        self.init = Some(body);
        self
    }

    /// Code spliced at the end of every loop iteration.
    pub fn on_loop(&mut self, body: TokenStream) -> &mut CodeGenContext {
        self.on_loop = Some(body);
        self
    }

    /// Code spliced after the matcher loop, reached on every exit path.
    pub fn on_return(&mut self, body: TokenStream) -> &mut CodeGenContext {
        self.on_return = Some(body);
        self
    }

    /// Code spliced when a byte has no transition, before `cs` is negated.
    pub fn on_error(&mut self, body: TokenStream) -> &mut CodeGenContext {
        self.on_error = Some(body);
        self
    }

    /// Rename the escape label (without the leading tick). `break` to this
    /// label from an action body exits the matcher with `cs` and `p`
    /// preserved.
    pub fn escape_label(&mut self, name: &str) -> &mut CodeGenContext {
        self.escape = name.to_string();
        self
    }

    /// Rename the `p` variable.
    pub fn var_p(&mut self, name: &str) -> &mut CodeGenContext {
        self.p = name.to_string();
        self
    }

    /// Rename the `p_end` variable.
    pub fn var_p_end(&mut self, name: &str) -> &mut CodeGenContext {
        self.p_end = name.to_string();
        self
    }

    /// Rename the `cs` variable.
    pub fn var_cs(&mut self, name: &str) -> &mut CodeGenContext {
        self.cs = name.to_string();
        self
    }

    /// Rename the `byte` variable.
    pub fn var_byte(&mut self, name: &str) -> &mut CodeGenContext {
        self.byte = name.to_string();
        self
    }

    /// Rename the `data` variable.
    pub fn var_data(&mut self, name: &str) -> &mut CodeGenContext {
        self.data = name.to_string();
        self
    }

    /// Rename the `is_eof` variable.
    pub fn var_is_eof(&mut self, name: &str) -> &mut CodeGenContext {
        self.is_eof = name.to_string();
        self
    }
}

impl Default for CodeGenContext {
    fn default() -> CodeGenContext {
        CodeGenContext::new()
    }
}

/// Emit matcher source for the given machine with the given configuration.
///
/// The returned token stream is a block of statements operating on the
/// protocol variables; the caller wraps it in whatever function or scope
/// suits it. See the module documentation for the protocol.
pub fn emit(machine: &Machine, config: &CodeGenContext) -> Result<TokenStream> {
    let emitter = Emitter::new(machine, config)?;
    match config.backend {
        Backend::Goto => goto::emit(&emitter),
        Backend::Table => table::emit(&emitter),
    }
}

/// Shared emission state: the machine, the config, and the protocol
/// variable names resolved into identifiers.
pub(crate) struct Emitter<'a> {
    pub(crate) machine: &'a Machine,
    pub(crate) config: &'a CodeGenContext,
    pub(crate) p: Ident,
    pub(crate) p_end: Ident,
    pub(crate) cs: Ident,
    pub(crate) byte: Ident,
    pub(crate) data: Ident,
    pub(crate) is_eof: Ident,
    pub(crate) escape: TokenStream,
}

impl<'a> Emitter<'a> {
    fn new(machine: &'a Machine, config: &'a CodeGenContext) -> Result<Emitter<'a>> {
        Ok(Emitter {
            machine,
            config,
            p: parse_ident(&config.p)?,
            p_end: parse_ident(&config.p_end)?,
            cs: parse_ident(&config.cs)?,
            byte: parse_ident(&config.byte)?,
            data: parse_ident(&config.data)?,
            is_eof: parse_ident(&config.is_eof)?,
            escape: parse_label(&config.escape)?,
        })
    }

    /// The expression reading the current byte, honoring the bounds-check
    /// policy.
    pub(crate) fn read_byte(&self) -> TokenStream {
        let (p, data) = (&self.p, &self.data);
        if self.config.bounds_checks {
            quote! { #data[#p - 1] }
        } else {
            quote! { unsafe { *#data.get_unchecked(#p - 1) } }
        }
    }

    /// The caller-supplied bodies of the given actions, in firing order.
    pub(crate) fn action_bodies(&self, list: &ActionList) -> Result<TokenStream> {
        let mut bodies = TokenStream::new();
        for id in list.iter() {
            let name = self.machine.action_name(id);
            match self.config.actions.get(name) {
                None => return Err(Error::missing_action_body(name)),
                Some(body) => bodies.extend(body.clone()),
            }
        }
        Ok(bodies)
    }

    /// The conjunction of a guard's literals as a boolean expression, or
    /// `None` for the trivial guard.
    pub(crate) fn guard_expr(&self, guard: &Guard) -> Result<Option<TokenStream>> {
        let mut terms = Vec::new();
        for (id, expected) in guard.literals() {
            let name = self.machine.precondition_name(id);
            let expr = match self.config.preconds.get(name) {
                None => return Err(Error::missing_precondition(name)),
                Some(expr) => expr,
            };
            terms.push(if expected {
                quote! { (#expr) }
            } else {
                quote! { !(#expr) }
            });
        }
        if terms.is_empty() {
            return Ok(None);
        }
        let mut expr = terms.remove(0);
        for term in terms {
            expr = quote! { #expr && #term };
        }
        Ok(Some(expr))
    }

    /// The match arm pattern for an edge's byte range.
    pub(crate) fn byte_pattern(&self, edge: &Edge) -> TokenStream {
        let (lo, hi) = edge.range();
        let lo_lit = Literal::u8_suffixed(lo);
        if lo == hi {
            quote! { #lo_lit }
        } else {
            let hi_lit = Literal::u8_suffixed(hi);
            quote! { #lo_lit..=#hi_lit }
        }
    }

    /// The end-of-input dispatch: run the EOF actions of the accepting
    /// state the matcher stopped in and flag success.
    pub(crate) fn eof_block(&self) -> Result<TokenStream> {
        let cs = &self.cs;
        let mut arms = Vec::new();
        for id in 1..=self.machine.state_count() as u32 {
            let eof = match self.machine.eof_actions(id) {
                None => continue,
                Some(eof) => eof,
            };
            let bodies = self.action_bodies(eof)?;
            let id_lit = Literal::i32_suffixed(id as i32);
            arms.push(quote! { #id_lit => { #bodies #cs = 0i32; } });
        }
        Ok(quote! {
            match #cs {
                #(#arms)*
                _ => {}
            }
        })
    }

    pub(crate) fn hook(&self, hook: &Option<TokenStream>) -> TokenStream {
        hook.clone().unwrap_or_default()
    }
}

pub(crate) fn parse_ident(name: &str) -> Result<Ident> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !head_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::codegen_config(format!(
            "{:?} is not a valid variable name",
            name,
        )));
    }
    Ok(Ident::new(name, Span::call_site()))
}

fn parse_label(name: &str) -> Result<TokenStream> {
    parse_ident(name)?;
    format!("'{}", name).parse().map_err(|_| {
        Error::codegen_config(format!("{:?} is not a valid label name", name))
    })
}

#[cfg(test)]
mod tests {
    use quote::quote;

    use super::*;
    use crate::action::Context;
    use crate::compile::{compile, Config};
    use crate::regex::Regex;

    fn counting_machine() -> Machine {
        let re = Regex::parse("a+b").unwrap().on_all(["seen"]);
        compile(&re, &mut Context::new(), &Config::new()).unwrap()
    }

    #[test]
    fn goto_backend_emits_state_dispatch() {
        let machine = counting_machine();
        let mut config = CodeGenContext::new();
        config.action("seen", quote! { seen += 1; });
        let src = emit(&machine, &config).unwrap().to_string();
        assert!(src.contains("'resume"));
        assert!(src.contains("match cs"));
        assert!(src.contains("seen += 1"));
        assert!(src.contains("is_eof"));
        assert!(src.contains("p += 1"));
    }

    #[test]
    fn table_backend_emits_tables() {
        let machine = counting_machine();
        let mut config = CodeGenContext::new();
        config.backend(Backend::Table);
        config.action("seen", quote! { seen += 1; });
        let src = emit(&machine, &config).unwrap().to_string();
        assert!(src.contains("__CLASSES"));
        assert!(src.contains("__TRANS"));
        assert!(src.contains("__ACT_SEQS"));
        assert!(src.contains("seen += 1"));
    }

    #[test]
    fn missing_action_body_is_an_error() {
        let machine = counting_machine();
        let config = CodeGenContext::new();
        assert!(emit(&machine, &config).is_err());
    }

    #[test]
    fn missing_precondition_is_an_error() {
        let mut ctx = Context::new();
        ctx.declare_precondition("live");
        let re = Regex::byte(b'a').when("live");
        let machine = compile(&re, &mut ctx, &Config::new()).unwrap();
        assert!(emit(&machine, &CodeGenContext::new()).is_err());

        let mut config = CodeGenContext::new();
        config.precondition("live", quote! { self.live });
        let src = emit(&machine, &config).unwrap().to_string();
        assert!(src.contains("self . live"));
    }

    #[test]
    fn variable_overrides_apply() {
        let machine = counting_machine();
        let mut config = CodeGenContext::new();
        config.var_cs("state").var_data("buf").escape_label("out");
        config.action("seen", quote! {});
        let src = emit(&machine, &config).unwrap().to_string();
        assert!(src.contains("match state"));
        assert!(src.contains("buf ["));
        assert!(src.contains("'out"));
        assert!(!src.contains("'resume"));
    }

    #[test]
    fn bounds_check_policy_switches_indexing() {
        let machine = counting_machine();
        let mut config = CodeGenContext::new();
        config.bounds_checks(false);
        config.action("seen", quote! {});
        let src = emit(&machine, &config).unwrap().to_string();
        assert!(src.contains("get_unchecked"));
    }

    #[test]
    fn invalid_variable_name_is_rejected() {
        let machine = counting_machine();
        let mut config = CodeGenContext::new();
        config.var_p("not a name");
        config.action("seen", quote! {});
        assert!(emit(&machine, &config).is_err());
    }
}

