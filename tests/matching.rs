use regex_machine::{
    compile, Config, Context, ErrorKind, Recorder, Regex, Tokenizer,
};

fn machine(pattern: &str) -> regex_machine::Machine {
    let re = Regex::parse(pattern).unwrap();
    compile(&re, &mut Context::new(), &Config::new()).unwrap()
}

#[test]
fn validator_accepts_and_rejects_with_positions() {
    let m = machine("a(bc)*|def|x+");

    assert!(m.validate(b"def").is_ok());
    assert!(m.validate(b"abcbcbcbcbc").is_ok());
    assert!(m.validate(b"xxxxxx").is_ok());

    assert_eq!(m.validate(b"").unwrap_err().position(), 1);
    assert_eq!(m.validate(b"abcabc").unwrap_err().position(), 4);
    assert_eq!(m.validate(b"defdef").unwrap_err().position(), 4);
}

#[test]
fn io_validator_reports_line_and_column() {
    let m = machine("(>[a-z]+\n)+");
    let err = m.validate(b">abc\n>def\n>ghi\n>j!").unwrap_err();
    assert_eq!(err.line(), 4);
    assert_eq!(err.column(), 3);
    assert_eq!(err.position(), 18);
    assert!(err.expected().contains(b'\n'));
    assert!(err.expected().contains(b'z'));
    assert!(!err.expected().contains(b'!'));
}

#[test]
fn ambiguous_final_actions_are_detected() {
    let left = Regex::parse("ab").unwrap().on_final(["first"]);
    let right = Regex::parse("ab").unwrap().on_final(["second"]);
    let re = Regex::alt(left, right);

    let mut strict = Config::new();
    strict.unambiguous(true);
    let err = compile(&re, &mut Context::new(), &strict).unwrap_err();
    match err.kind() {
        ErrorKind::Ambiguous { left, right, witness } => {
            let mut names = vec![left.clone(), right.clone()];
            names.sort();
            assert_eq!(names, vec!["first".to_string(), "second".to_string()]);
            assert_eq!(witness.as_slice(), &b"ab"[..]);
        }
        kind => panic!("expected ambiguity, got {:?}", kind),
    }

    // The same compile succeeds in ambiguous mode and the later
    // declaration wins the conflict.
    let mut ctx = Context::new();
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();
    let mut rec = Recorder::new();
    assert_eq!(m.run(b"ab", &mut rec).cs, 0);
    assert_eq!(rec.fired, vec!["second".to_string()]);
}

#[test]
fn minimization_preserves_the_language() {
    let inputs: &[&[u8]] = &[
        b"", b"a", b"ab", b"abc", b"abcbc", b"def", b"de", b"x", b"xxxx",
        b"abcx", b"defx", b"ax",
    ];
    let re = Regex::parse("a(bc)*|def|x+").unwrap();

    let mut plain = Config::new();
    plain.minimize(false);
    let unminimized = compile(&re, &mut Context::new(), &plain).unwrap();
    let minimized = compile(&re, &mut Context::new(), &Config::new()).unwrap();

    assert!(minimized.state_count() <= unminimized.state_count());
    for input in inputs {
        assert_eq!(
            unminimized.is_match(input),
            minimized.is_match(input),
            "language changed on {:?}",
            input,
        );
    }
}

#[test]
fn byte_class_compression_preserves_the_language() {
    let re = Regex::parse("[a-m]+[n-z]*0").unwrap();
    let mut raw = Config::new();
    raw.byte_classes(false);
    let uncompressed = compile(&re, &mut Context::new(), &raw).unwrap();
    let compressed = compile(&re, &mut Context::new(), &Config::new()).unwrap();

    for input in [&b"abc0"[..], b"amz0", b"a0", b"0", b"nz0", b"az"] {
        assert_eq!(uncompressed.is_match(input), compressed.is_match(input));
    }
    assert!(compressed.byte_classes().alphabet_len() < 256);
}

#[test]
fn machines_are_deterministic() {
    let m = machine("a(bc)*|def|x+");
    for state in 1..=m.state_count() as u32 {
        for byte in 0..=255u8 {
            let unguarded = m
                .edges(state)
                .iter()
                .filter(|e| {
                    let (lo, hi) = e.range();
                    lo <= byte && byte <= hi && e.guard().is_none()
                })
                .count();
            assert!(unguarded <= 1, "state {} byte {}", state, byte);
        }
    }
}

#[test]
fn alt_of_equal_languages_is_language_equivalent() {
    let a = machine("ab|ab");
    let b = machine("ab");
    for input in [&b""[..], b"a", b"ab", b"abb"] {
        assert_eq!(a.is_match(input), b.is_match(input));
    }
}

#[test]
fn intersection_requires_both_languages() {
    let re =
        Regex::parse("a[ab]*").unwrap().intersect(Regex::parse("[ab]*b").unwrap());
    let m = compile(&re, &mut Context::new(), &Config::new()).unwrap();
    assert!(m.is_match(b"ab"));
    assert!(m.is_match(b"abab"));
    assert!(m.is_match(b"aab"));
    assert!(!m.is_match(b"a"));
    assert!(!m.is_match(b"ba"));
    assert!(!m.is_match(b"b"));
}

#[test]
fn difference_removes_the_right_language() {
    let re = Regex::parse("[ab]+").unwrap().diff(Regex::parse("b+").unwrap());
    let m = compile(&re, &mut Context::new(), &Config::new()).unwrap();
    assert!(m.is_match(b"a"));
    assert!(m.is_match(b"ab"));
    assert!(m.is_match(b"ba"));
    assert!(!m.is_match(b"b"));
    assert!(!m.is_match(b"bbb"));
    assert!(!m.is_match(b""));
}

#[test]
fn negation_of_a_language_is_disjoint_from_it() {
    let base = Regex::parse("a+").unwrap();
    let re = base.clone().intersect(base.negate());
    let m = compile(&re, &mut Context::new(), &Config::new()).unwrap();
    for input in [&b""[..], b"a", b"aa", b"aaa", b"b", b"ab"] {
        assert!(!m.is_match(input), "matched {:?}", input);
    }
}

#[test]
fn enter_exit_fire_around_the_sublanguage() {
    let mut ctx = Context::new();
    let inner = Regex::parse("b+").unwrap().on_enter(["in"]).on_exit(["out"]);
    let re = Regex::concat(vec![Regex::byte(b'a'), inner, Regex::byte(b'c')]);
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();

    let mut rec = Recorder::new();
    assert_eq!(m.run(b"abbc", &mut rec).cs, 0);
    assert_eq!(rec.fired, vec!["in".to_string(), "out".to_string()]);
}

#[test]
fn exit_actions_fire_at_eof() {
    let mut ctx = Context::new();
    let re = Regex::parse("ab").unwrap().on_exit(["done"]);
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();

    let mut rec = Recorder::new();
    assert_eq!(m.run(b"ab", &mut rec).cs, 0);
    assert_eq!(rec.fired, vec!["done".to_string()]);
}

#[test]
fn all_actions_fire_per_byte() {
    let mut ctx = Context::new();
    let re = Regex::parse("a+").unwrap().on_all(["tick"]);
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();

    let mut rec = Recorder::new();
    assert_eq!(m.run(b"aaa", &mut rec).cs, 0);
    assert_eq!(rec.fired, vec!["tick"; 3]);
}

#[test]
fn final_actions_fire_on_last_byte() {
    let mut ctx = Context::new();
    // Declaration order decides ties, so "tick" goes ahead of "fin" on
    // the shared final byte.
    ctx.declare_action("tick", 0);
    ctx.declare_action("fin", 0);
    let re = Regex::parse("ab").unwrap().on_final(["fin"]).on_all(["tick"]);
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();

    let mut rec = Recorder::new();
    assert_eq!(m.run(b"ab", &mut rec).cs, 0);
    assert_eq!(
        rec.fired,
        vec!["tick".to_string(), "tick".to_string(), "fin".to_string()],
    );
}

#[test]
fn action_order_follows_priority_then_declaration() {
    let mut ctx = Context::new();
    ctx.declare_action("low", -1);
    ctx.declare_action("high", 10);
    ctx.declare_action("mid", 0);
    let re = Regex::byte(b'z').on_enter(["low", "mid", "high"]);
    let m = compile(&re, &mut ctx, &Config::new()).unwrap();

    let mut rec = Recorder::new();
    assert_eq!(m.run(b"z", &mut rec).cs, 0);
    assert_eq!(
        rec.fired,
        vec!["high".to_string(), "mid".to_string(), "low".to_string()],
    );
}

#[test]
fn state_limit_is_enforced() {
    // Twenty trailing optionals need far more than eight states.
    let re = Regex::parse("a[ab]{0,20}").unwrap();
    let mut config = Config::new();
    config.state_limit(8);
    let err = compile(&re, &mut Context::new(), &config).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::TooManyStates { .. }));
}

#[test]
fn tokenizer_unambiguous_mode_rejects_identical_rules() {
    let rules = vec![
        ("one", Regex::parse("ab").unwrap()),
        ("two", Regex::parse("ab").unwrap()),
    ];
    let mut strict = Config::new();
    strict.unambiguous(true);
    let err = Tokenizer::with_config(rules, &strict).unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains("one") && rendered.contains("two"));

    let rules = vec![
        ("one", Regex::parse("ab").unwrap()),
        ("two", Regex::parse("ab").unwrap()),
    ];
    assert!(Tokenizer::new(rules).is_ok());
}
