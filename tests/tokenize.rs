use regex_machine::{Regex, Tokenizer};

fn tokenizer(rules: &[(&str, &str)]) -> Tokenizer {
    Tokenizer::new(
        rules
            .iter()
            .map(|&(name, pattern)| (name, Regex::parse(pattern).unwrap()))
            .collect::<Vec<_>>(),
    )
    .unwrap()
}

#[test]
fn longest_match_wins() {
    let tok = tokenizer(&[("a", "a"), ("ab", "a*b"), ("cd", "cd")]);
    let tokens: Vec<_> = tok.tokens(b"abaabba").collect();
    assert_eq!(tokens, vec![(1, 2, 2), (3, 3, 2), (6, 1, 2), (7, 1, 1)]);
}

#[test]
fn unmatched_input_becomes_an_error_token() {
    let tok = tokenizer(&[("a", "a"), ("ab", "a*b"), ("cd", "cd")]);
    let tokens: Vec<_> = tok.tokens(b"c").collect();
    assert_eq!(tokens, vec![(1, 1, 0)]);
}

#[test]
fn adjacent_error_bytes_coalesce() {
    let tok = tokenizer(&[("a", "a")]);
    let tokens: Vec<_> = tok.tokens(b"xxaxx").collect();
    assert_eq!(tokens, vec![(1, 2, 0), (3, 1, 1), (4, 2, 0)]);
}

#[test]
fn ties_go_to_the_later_rule_after_length() {
    let tok = tokenizer(&[("abp", "ab+"), ("a", "a")]);
    let tokens: Vec<_> = tok.tokens(b"abbbabaaababa").collect();
    assert_eq!(
        tokens,
        vec![
            (1, 4, 1),
            (5, 2, 1),
            (7, 1, 2),
            (8, 1, 2),
            (9, 2, 1),
            (11, 2, 1),
            (13, 1, 2),
        ],
    );
}

#[test]
fn identical_rules_resolve_to_the_higher_index() {
    let tok = tokenizer(&[("one", "ab"), ("two", "ab")]);
    let tokens: Vec<_> = tok.tokens(b"abab").collect();
    assert_eq!(tokens, vec![(1, 2, 2), (3, 2, 2)]);
}

#[test]
fn empty_input_yields_no_tokens() {
    let tok = tokenizer(&[("a", "a")]);
    assert_eq!(tok.tokens(b"").count(), 0);
}

#[test]
fn token_names_are_kept_in_declaration_order() {
    let tok = tokenizer(&[("alpha", "a"), ("beta", "b")]);
    assert_eq!(
        tok.token_names(),
        &["alpha".to_string(), "beta".to_string()],
    );
}

#[test]
fn emitted_tokenizer_embeds_its_tables() {
    let tok = tokenizer(&[("word", "[a-z]+"), ("num", "[0-9]+")]);
    let src = tok.emit("Lexer").unwrap().to_string();
    assert!(src.contains("struct Lexer"));
    assert!(src.contains("Iterator for Lexer"));
    assert!(src.contains("__TRANS"));
    assert!(src.contains("__ACCEPT"));
    assert!(tok.emit("not an ident").is_err());
}

#[test]
fn interpreted_and_emitted_semantics_share_the_machine() {
    // The emitted iterator reads the same accept table the interpreter
    // resolves tokens from, so spot-check the interpreter against a hand
    // computed stream.
    let tok = tokenizer(&[("word", "[a-z]+"), ("space", " +")]);
    let tokens: Vec<_> = tok.tokens(b"ab  cd").collect();
    assert_eq!(tokens, vec![(1, 2, 1), (3, 2, 2), (5, 2, 1)]);
}
