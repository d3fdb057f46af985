use proc_macro2::{Literal, TokenStream};
use quote::quote;

use crate::action::{ActionId, Context};
use crate::compile::{compile, Config};
use crate::error::Result;
use crate::machine::{Machine, START};
use crate::regex::Regex;

/// A tokenizer compiled from an ordered list of named token rules.
///
/// Each rule's regex is tagged with a marker action named after the token
/// and given priority equal to its declaration index, then the rules are
/// alternated into a single machine compiled in ambiguous mode. The
/// generic conflict resolution — higher priority wins, ties to the later
/// declaration — therefore yields exactly the "longest match, highest
/// index on tie" rule at every accepting position.
///
/// # Example
///
/// ```
/// use regex_machine::{Regex, Tokenizer};
///
/// let tok = Tokenizer::new(vec![
///     ("a", Regex::parse("a").unwrap()),
///     ("ab", Regex::parse("a*b").unwrap()),
///     ("cd", Regex::parse("cd").unwrap()),
/// ])
/// .unwrap();
/// let tokens: Vec<_> = tok.tokens(b"abaabba").collect();
/// assert_eq!(tokens, vec![(1, 2, 2), (3, 3, 2), (6, 1, 2), (7, 1, 1)]);
/// ```
pub struct Tokenizer {
    machine: Machine,
    names: Vec<String>,
    markers: Vec<ActionId>,
}

impl Tokenizer {
    /// Build a tokenizer from `(name, regex)` rules with the default
    /// compile configuration (ambiguous mode).
    pub fn new<I, S>(rules: I) -> Result<Tokenizer>
    where
        I: IntoIterator<Item = (S, Regex)>,
        S: Into<String>,
    {
        Tokenizer::with_config(rules, &Config::new())
    }

    /// Build a tokenizer with an explicit compile configuration.
    ///
    /// Compiling with `unambiguous` enabled turns any two rules that can
    /// accept the same input on the same byte into a compile error naming
    /// both token markers.
    pub fn with_config<I, S>(rules: I, config: &Config) -> Result<Tokenizer>
    where
        I: IntoIterator<Item = (S, Regex)>,
        S: Into<String>,
    {
        let mut ctx = Context::new();
        let mut names = Vec::new();
        let mut markers = Vec::new();
        let mut alternated: Option<Regex> = None;
        for (i, (name, re)) in rules.into_iter().enumerate() {
            let name = name.into();
            markers.push(ctx.declare_action(&name, (i + 1) as i32));
            let tagged = re.on_exit([name.clone()]);
            alternated = Some(match alternated {
                None => tagged,
                Some(prev) => Regex::alt(prev, tagged),
            });
            names.push(name);
        }
        let re = alternated.unwrap_or_else(Regex::empty);
        let machine = compile(&re, &mut ctx, config)?;
        Ok(Tokenizer { machine, names, markers })
    }

    /// The underlying machine.
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// The declared token names, in declaration order.
    pub fn token_names(&self) -> &[String] {
        &self.names
    }

    /// Lazily tokenize the buffer.
    ///
    /// Each item is `(start, length, token_index)` with 1-indexed start
    /// offsets and 1-indexed token indices in declaration order. Maximal
    /// spans matched by no rule are yielded with `token_index == 0`.
    pub fn tokens<'t, 'd>(&'t self, data: &'d [u8]) -> Tokens<'t, 'd> {
        Tokens { tokenizer: self, data, pos: 0 }
    }

    /// The 1-indexed token recognized when the input ends in the given
    /// accepting state.
    fn token_at(&self, state: u32) -> Option<usize> {
        let eof = self.machine.eof_actions(state)?;
        // The list is in priority order, so the first marker is the winner.
        eof.iter().find_map(|id| {
            self.markers.iter().position(|&m| m == id).map(|i| i + 1)
        })
    }

    /// The longest token match starting at `pos` (0-indexed), as
    /// `(length, token_index)`. Zero-length matches are ignored so the
    /// tokenizer always makes progress.
    fn longest_at(&self, data: &[u8], pos: usize) -> Option<(usize, usize)> {
        let mut cs = START;
        let mut best = None;
        for (i, &byte) in data[pos..].iter().enumerate() {
            let mut next = None;
            for edge in self.machine.edges(cs) {
                let (lo, hi) = edge.range();
                if lo <= byte && byte <= hi && edge.guard().is_none() {
                    next = Some(edge.target());
                    break;
                }
            }
            match next {
                None => break,
                Some(id) => cs = id,
            }
            if let Some(tok) = self.token_at(cs) {
                best = Some((i + 1, tok));
            }
        }
        best
    }

    /// Emit a self-contained tokenizer type with the given name: a struct
    /// borrowing a buffer whose `Iterator` implementation yields the same
    /// `(start, length, token_index)` stream as [`Tokenizer::tokens`],
    /// driven by embedded transition tables.
    pub fn emit(&self, name: &str) -> Result<TokenStream> {
        let name = crate::codegen::parse_ident(name)?;
        let classes = self.machine.byte_classes();
        let k = classes.alphabet_len();
        let n = self.machine.state_count();

        let mut trans = vec![0i32; (n + 1) * k];
        let mut accept = vec![0u16; n + 1];
        for id in 1..=n as u32 {
            let row = id as usize * k;
            for c in 0..k {
                trans[row + c] = -(id as i32);
            }
            for edge in self.machine.edges(id) {
                if !edge.guard().is_none() {
                    continue;
                }
                let (lo, hi) = edge.range();
                for b in lo as usize..=hi as usize {
                    trans[row + classes.get(b as u8) as usize] =
                        edge.target() as i32;
                }
            }
            if let Some(tok) = self.token_at(id) {
                accept[id as usize] = tok as u16;
            }
        }

        let class_lits =
            (0..256).map(|b| Literal::u8_suffixed(classes.get(b as u8)));
        let trans_lits = trans.iter().map(|&t| Literal::i32_suffixed(t));
        let accept_lits = accept.iter().map(|&t| Literal::u16_suffixed(t));
        let total = Literal::usize_unsuffixed((n + 1) * k);
        let states = Literal::usize_unsuffixed(n + 1);
        let k_lit = Literal::usize_unsuffixed(k);

        Ok(quote! {
            pub struct #name<'a> {
                data: &'a [u8],
                pos: usize,
            }

            impl<'a> #name<'a> {
                pub fn new(data: &'a [u8]) -> #name<'a> {
                    #name { data, pos: 0 }
                }

                fn longest_at(&self, pos: usize) -> Option<(usize, usize)> {
                    static __CLASSES: [u8; 256] = [#(#class_lits),*];
                    static __TRANS: [i32; #total] = [#(#trans_lits),*];
                    static __ACCEPT: [u16; #states] = [#(#accept_lits),*];
                    let mut cs: i32 = 1;
                    let mut best = None;
                    for (i, &byte) in self.data[pos..].iter().enumerate() {
                        let class = __CLASSES[byte as usize] as usize;
                        cs = __TRANS[cs as usize * #k_lit + class];
                        if cs <= 0 {
                            break;
                        }
                        let token = __ACCEPT[cs as usize];
                        if token != 0 {
                            best = Some((i + 1, token as usize));
                        }
                    }
                    best
                }
            }

            impl<'a> Iterator for #name<'a> {
                type Item = (usize, usize, usize);

                fn next(&mut self) -> Option<(usize, usize, usize)> {
                    if self.pos >= self.data.len() {
                        return None;
                    }
                    if let Some((len, token)) = self.longest_at(self.pos) {
                        let start = self.pos + 1;
                        self.pos += len;
                        return Some((start, len, token));
                    }
                    let err_start = self.pos;
                    self.pos += 1;
                    while self.pos < self.data.len()
                        && self.longest_at(self.pos).is_none()
                    {
                        self.pos += 1;
                    }
                    Some((err_start + 1, self.pos - err_start, 0))
                }
            }
        })
    }
}

/// The lazy token stream over one buffer. See [`Tokenizer::tokens`].
#[derive(Debug)]
pub struct Tokens<'t, 'd> {
    tokenizer: &'t Tokenizer,
    data: &'d [u8],
    pos: usize,
}

impl<'t, 'd> Iterator for Tokens<'t, 'd> {
    type Item = (usize, usize, usize);

    fn next(&mut self) -> Option<(usize, usize, usize)> {
        if self.pos >= self.data.len() {
            return None;
        }
        if let Some((len, token)) = self.tokenizer.longest_at(self.data, self.pos)
        {
            let start = self.pos + 1;
            self.pos += len;
            return Some((start, len, token));
        }
        // No rule matches here; extend the error span until one does.
        let err_start = self.pos;
        self.pos += 1;
        while self.pos < self.data.len()
            && self.tokenizer.longest_at(self.data, self.pos).is_none()
        {
            self.pos += 1;
        }
        Some((err_start + 1, self.pos - err_start, 0))
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("names", &self.names)
            .field("machine", &self.machine)
            .finish()
    }
}
