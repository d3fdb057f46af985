use std::fmt;

use regex_syntax::hir::{self, Hir, HirKind};
use regex_syntax::ParserBuilder;

use crate::byteset::{escape, ByteSet};
use crate::error::{Error, Result};

/// A regular expression over byte inputs, with action annotations.
///
/// A `Regex` is an immutable value. Every operator builds a new node and
/// every annotation method returns the same logical node with the
/// annotation installed, so sub-expressions can be shared and reused
/// freely. Compilation never mutates a regex.
///
/// # Example
///
/// ```
/// use regex_machine::Regex;
///
/// // The language `a(bc)*`, counting every `b` seen.
/// let re = Regex::concat(vec![
///     Regex::byte(b'a'),
///     Regex::concat(vec![
///         Regex::byte(b'b').on_all(["count_b"]),
///         Regex::byte(b'c'),
///     ])
///     .rep(),
/// ]);
/// assert_eq!(re.to_string(), "a(bc)*");
/// ```
#[derive(Clone, Debug)]
pub struct Regex {
    kind: RegexKind,
    enter: Vec<String>,
    final_: Vec<String>,
    exit: Vec<String>,
    all: Vec<String>,
    precond: Option<String>,
}

/// The kind of a regex node.
#[derive(Clone, Debug)]
pub enum RegexKind {
    /// The empty string.
    Empty,
    /// Any one byte drawn from the set.
    Symbol(ByteSet),
    /// Each child in order.
    Concat(Vec<Regex>),
    /// Either side, with the left side declared first.
    Alt(Box<Regex>, Box<Regex>),
    /// Zero or more repetitions.
    Rep(Box<Regex>),
    /// Inputs in both languages.
    And(Box<Regex>, Box<Regex>),
    /// Inputs in the left language but not the right one.
    Diff(Box<Regex>, Box<Regex>),
}

impl Regex {
    fn new(kind: RegexKind) -> Regex {
        Regex {
            kind,
            enter: Vec::new(),
            final_: Vec::new(),
            exit: Vec::new(),
            all: Vec::new(),
            precond: None,
        }
    }

    /// The regex matching only the empty string.
    pub fn empty() -> Regex {
        Regex::new(RegexKind::Empty)
    }

    /// A regex matching any single byte in the given set.
    ///
    /// An empty set is accepted here but rejected at compile time, since
    /// such a symbol matches nothing.
    pub fn symbol(bytes: ByteSet) -> Regex {
        Regex::new(RegexKind::Symbol(bytes))
    }

    /// A regex matching the single byte `b`.
    pub fn byte(b: u8) -> Regex {
        Regex::symbol(ByteSet::singleton(b))
    }

    /// A regex matching any single byte in the inclusive range `lo..=hi`.
    pub fn byte_range(lo: u8, hi: u8) -> Regex {
        Regex::symbol(ByteSet::range(lo, hi))
    }

    /// A regex matching the UTF-8 encoding of the given code point, as a
    /// sequence of byte literals.
    pub fn char(c: char) -> Regex {
        let mut buf = [0; 4];
        Regex::concat(
            c.encode_utf8(&mut buf).as_bytes().iter().map(|&b| Regex::byte(b)),
        )
    }

    /// A regex matching the UTF-8 encoding of the given string, byte for
    /// byte.
    pub fn literal(s: &str) -> Regex {
        Regex::concat(s.bytes().map(Regex::byte))
    }

    /// A regex matching any single byte.
    pub fn any() -> Regex {
        Regex::symbol(ByteSet::full())
    }

    /// The concatenation of the given regexes, in order.
    ///
    /// Unannotated `Empty` children are dropped and unannotated nested
    /// concatenations are flattened, so `concat(R, Empty)` is `R`.
    pub fn concat<I>(children: I) -> Regex
    where
        I: IntoIterator<Item = Regex>,
    {
        let mut flat = Vec::new();
        for child in children {
            if !child.is_annotated() {
                match child.kind {
                    RegexKind::Empty => continue,
                    RegexKind::Concat(grandchildren) => {
                        flat.extend(grandchildren);
                        continue;
                    }
                    _ => {}
                }
            }
            flat.push(child);
        }
        match flat.len() {
            0 => Regex::empty(),
            1 => flat.pop().unwrap(),
            _ => Regex::new(RegexKind::Concat(flat)),
        }
    }

    /// The alternation of the two regexes. The left side is declared first,
    /// which matters for priority-based disambiguation.
    pub fn alt(left: Regex, right: Regex) -> Regex {
        Regex::new(RegexKind::Alt(Box::new(left), Box::new(right)))
    }

    /// Zero or more repetitions of this regex (Kleene star).
    ///
    /// `rep` of an unannotated `Empty` is `Empty`.
    pub fn rep(self) -> Regex {
        if let RegexKind::Empty = self.kind {
            if !self.is_annotated() {
                return self;
            }
        }
        Regex::new(RegexKind::Rep(Box::new(self)))
    }

    /// Zero or one occurrence of this regex.
    pub fn opt(self) -> Regex {
        Regex::alt(self, Regex::empty())
    }

    /// One or more repetitions of this regex.
    pub fn rep1(self) -> Regex {
        let star = self.clone().rep();
        Regex::concat(vec![self, star])
    }

    /// The intersection of the two languages.
    pub fn intersect(self, other: Regex) -> Regex {
        Regex::new(RegexKind::And(Box::new(self), Box::new(other)))
    }

    /// The left language minus the right language.
    pub fn diff(self, other: Regex) -> Regex {
        Regex::new(RegexKind::Diff(Box::new(self), Box::new(other)))
    }

    /// Every byte sequence not matched by this regex.
    pub fn negate(self) -> Regex {
        Regex::any().rep().diff(self)
    }

    /// Attach enter actions: they fire on the first byte consumed inside
    /// this sub-language.
    pub fn on_enter<I, S>(mut self, names: I) -> Regex
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enter.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach final actions: they fire on the last byte of the matched
    /// substring, when one is determinable.
    pub fn on_final<I, S>(mut self, names: I) -> Regex
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.final_.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach exit actions: they fire on the first byte after the matched
    /// substring, or at end of input if the match is still live there.
    pub fn on_exit<I, S>(mut self, names: I) -> Regex
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exit.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach all actions: they fire on every byte consumed inside this
    /// sub-language.
    pub fn on_all<I, S>(mut self, names: I) -> Regex
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.all.extend(names.into_iter().map(Into::into));
        self
    }

    /// Guard entry to this sub-language on the named precondition. A node
    /// carries at most one precondition; a second call replaces the first.
    pub fn when(mut self, precond: &str) -> Regex {
        self.precond = Some(precond.to_string());
        self
    }

    /// Parse a pattern string into a regex using the standard concrete
    /// syntax.
    ///
    /// The pattern is interpreted byte-wise: classes like `[a-z]` denote
    /// byte sets and non-ASCII literals are expanded to their UTF-8 byte
    /// sequences. Anchors, word boundaries and Unicode-aware classes are
    /// rejected.
    pub fn parse(pattern: &str) -> Result<Regex> {
        let hir = ParserBuilder::new()
            .utf8(false)
            .unicode(false)
            .build()
            .parse(pattern)
            .map_err(Error::syntax)?;
        Regex::from_hir(&hir)
    }

    fn from_hir(hir: &Hir) -> Result<Regex> {
        match hir.kind() {
            HirKind::Empty => Ok(Regex::empty()),
            HirKind::Literal(hir::Literal(ref bytes)) => {
                Ok(Regex::concat(bytes.iter().map(|&b| Regex::byte(b))))
            }
            HirKind::Class(hir::Class::Bytes(ref cls)) => {
                let mut set = ByteSet::empty();
                for range in cls.ranges() {
                    set = set.union(&ByteSet::range(range.start(), range.end()));
                }
                Ok(Regex::symbol(set))
            }
            HirKind::Class(hir::Class::Unicode(_)) => Err(Error::unsupported(
                "Unicode-aware character classes are not supported; \
                 byte oriented classes are",
            )),
            HirKind::Look(_) => Err(Error::unsupported(
                "anchors and look-around assertions are not supported",
            )),
            HirKind::Repetition(ref rep) => {
                let sub = Regex::from_hir(&rep.sub)?;
                Ok(Regex::repeat(sub, rep.min, rep.max))
            }
            HirKind::Capture(ref cap) => Regex::from_hir(&cap.sub),
            HirKind::Concat(ref subs) => {
                let children =
                    subs.iter().map(Regex::from_hir).collect::<Result<Vec<_>>>()?;
                Ok(Regex::concat(children))
            }
            HirKind::Alternation(ref subs) => {
                let mut children = subs.iter().map(Regex::from_hir);
                let first = match children.next() {
                    None => return Ok(Regex::empty()),
                    Some(first) => first?,
                };
                let mut re = first;
                for child in children {
                    re = Regex::alt(re, child?);
                }
                Ok(re)
            }
        }
    }

    fn repeat(sub: Regex, min: u32, max: Option<u32>) -> Regex {
        match (min, max) {
            (0, None) => sub.rep(),
            (0, Some(1)) => sub.opt(),
            (1, None) => sub.rep1(),
            (min, None) => {
                let mut parts: Vec<Regex> =
                    (0..min.saturating_sub(1)).map(|_| sub.clone()).collect();
                parts.push(sub.rep1());
                Regex::concat(parts)
            }
            (min, Some(max)) => {
                let mut parts: Vec<Regex> =
                    (0..min).map(|_| sub.clone()).collect();
                for _ in min..max {
                    parts.push(sub.clone().opt());
                }
                Regex::concat(parts)
            }
        }
    }

    /// The kind of this node.
    pub fn kind(&self) -> &RegexKind {
        &self.kind
    }

    pub(crate) fn enter_actions(&self) -> &[String] {
        &self.enter
    }

    pub(crate) fn final_actions(&self) -> &[String] {
        &self.final_
    }

    pub(crate) fn exit_actions(&self) -> &[String] {
        &self.exit
    }

    pub(crate) fn all_actions(&self) -> &[String] {
        &self.all
    }

    pub(crate) fn precondition(&self) -> Option<&str> {
        self.precond.as_deref()
    }

    fn is_annotated(&self) -> bool {
        !self.enter.is_empty()
            || !self.final_.is_empty()
            || !self.exit.is_empty()
            || !self.all.is_empty()
            || self.precond.is_some()
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            RegexKind::Empty => write!(f, "()"),
            RegexKind::Symbol(ref set) => {
                if set.len() == 1 {
                    let b = set.iter().next().unwrap();
                    write!(f, "{}", escape(b))
                } else if set.len() == 256 {
                    write!(f, ".")
                } else {
                    write!(f, "[")?;
                    for (lo, hi) in set.ranges() {
                        if lo == hi {
                            write!(f, "{}", escape(lo))?;
                        } else {
                            write!(f, "{}-{}", escape(lo), escape(hi))?;
                        }
                    }
                    write!(f, "]")
                }
            }
            RegexKind::Concat(ref children) => {
                for child in children {
                    match child.kind {
                        RegexKind::Alt(..)
                        | RegexKind::And(..)
                        | RegexKind::Diff(..) => write!(f, "({})", child)?,
                        _ => write!(f, "{}", child)?,
                    }
                }
                Ok(())
            }
            RegexKind::Alt(ref a, ref b) => write!(f, "{}|{}", a, b),
            RegexKind::Rep(ref a) => match a.kind {
                RegexKind::Symbol(_) | RegexKind::Empty => write!(f, "{}*", a),
                _ => write!(f, "({})*", a),
            },
            RegexKind::And(ref a, ref b) => write!(f, "{}&{}", a, b),
            RegexKind::Diff(ref a, ref b) => write!(f, "{}\\{}", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_with_empty_is_identity() {
        let re = Regex::concat(vec![Regex::byte(b'a'), Regex::empty()]);
        assert!(matches!(re.kind(), RegexKind::Symbol(_)));

        let re = Regex::concat(vec![Regex::empty(), Regex::empty()]);
        assert!(matches!(re.kind(), RegexKind::Empty));
    }

    #[test]
    fn rep_of_empty_is_empty() {
        assert!(matches!(Regex::empty().rep().kind(), RegexKind::Empty));
    }

    #[test]
    fn rep_of_annotated_empty_is_kept() {
        let re = Regex::empty().on_exit(["done"]).rep();
        assert!(matches!(re.kind(), RegexKind::Rep(_)));
    }

    #[test]
    fn concat_flattens_plain_children() {
        let inner = Regex::concat(vec![Regex::byte(b'b'), Regex::byte(b'c')]);
        let re = Regex::concat(vec![Regex::byte(b'a'), inner]);
        match re.kind() {
            RegexKind::Concat(children) => assert_eq!(children.len(), 3),
            kind => panic!("expected concat, got {:?}", kind),
        }
    }

    #[test]
    fn annotated_children_are_not_flattened() {
        let inner = Regex::concat(vec![Regex::byte(b'b'), Regex::byte(b'c')])
            .on_enter(["x"]);
        let re = Regex::concat(vec![Regex::byte(b'a'), inner]);
        match re.kind() {
            RegexKind::Concat(children) => assert_eq!(children.len(), 2),
            kind => panic!("expected concat, got {:?}", kind),
        }
    }

    #[test]
    fn annotation_returns_same_logical_node() {
        let re = Regex::byte(b'a').on_enter(["in"]).on_exit(["out"]);
        assert!(matches!(re.kind(), RegexKind::Symbol(_)));
        assert_eq!(re.enter_actions(), &["in".to_string()]);
        assert_eq!(re.exit_actions(), &["out".to_string()]);
    }

    #[test]
    fn parse_simple_patterns() {
        let re = Regex::parse("a(bc)*|def|x+").unwrap();
        assert!(matches!(re.kind(), RegexKind::Alt(..)));
        assert!(Regex::parse("a[0-9]{2,4}z").is_ok());
        assert!(Regex::parse("(>[a-z]+\n)+").is_ok());
    }

    #[test]
    fn parse_rejects_lookaround() {
        assert!(Regex::parse("^a$").is_err());
        assert!(Regex::parse(r"\bfoo\b").is_err());
    }

    #[test]
    fn display_roundtrips_shape() {
        let re = Regex::parse("a(bc)*").unwrap();
        assert_eq!(re.to_string(), "a(bc)*");
        let re = Regex::byte_range(b'a', b'z');
        assert_eq!(re.to_string(), "[a-z]");
    }
}
