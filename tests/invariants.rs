use combinators::prelude::*;
use combinators::Value;
use std::collections::HashSet;

fn sample_parser() -> ParserRef {
    letter().plus()
}

#[test]
fn invariant_1_position_is_within_bounds() {
    let p = sample_parser();
    for input in ["abc", "", "1bc"] {
        let result = p.parse(input);
        assert!(result.position() <= input.chars().count());
    }
}

#[test]
fn invariant_2_and_preserves_acceptance_but_resets_position() {
    let p = sample_parser();
    let lookahead = p.and();
    for input in ["abc", "123"] {
        assert_eq!(p.accept(input), lookahead.accept(input));
    }
    assert_eq!(lookahead.parse("abc").position(), 0);
}

#[test]
fn invariant_3_double_negation_matches_lookahead_acceptance() {
    let p = sample_parser();
    let double_not = p.not("not a").not("not not a");
    let lookahead = p.and();
    for input in ["abc", "123"] {
        assert_eq!(double_not.accept(input), lookahead.accept(input));
    }
}

#[test]
fn invariant_4_optional_always_succeeds() {
    let p = char('x').optional(Value::Unit);
    assert!(p.parse("x").is_success());
    assert!(p.parse("y").is_success());
    assert!(p.parse("").is_success());
}

#[test]
fn invariant_5_end_succeeds_iff_fully_consumed() {
    let p = char('a').star().end("trailing input");
    assert!(p.accept("aaa"));
    assert!(!p.accept("aaab"));
}

#[test]
fn invariant_6_star_always_succeeds_plus_requires_one() {
    let star = char('a').star();
    let plus = char('a').plus();
    assert!(star.accept(""));
    assert!(star.accept("bbb"));
    assert!(!plus.accept(""));
    assert!(plus.accept("a"));
}

#[test]
fn invariant_7_copy_is_structurally_equal_and_shallow() {
    let p = char('a').seq(char('b'));
    let copy = p.copy();
    let mut seen = HashSet::new();
    assert!(structural_eq(&p, &copy, &mut seen));
    assert!(!std::rc::Rc::ptr_eq(&p, &copy));
    assert!(p.children().iter().zip(copy.children().iter()).all(|(a, b)| std::rc::Rc::ptr_eq(a, b)));
}

#[test]
fn invariant_8_identity_transform_has_no_shared_identities() {
    let p = char('a').seq(char('b'));
    let copy = transform(&p, |n| n);
    let mut seen = HashSet::new();
    assert!(structural_eq(&p, &copy, &mut seen));
    for (original, transformed) in all_parsers(&p).iter().zip(all_parsers(&copy).iter()) {
        assert!(!std::rc::Rc::ptr_eq(original, transformed));
    }
}

#[test]
fn invariant_9_remove_duplicates_preserves_acceptance() {
    let p = char('a').seq(char('a')).seq(char('a'));
    let before_acceptance: Vec<bool> = ["aaa", "aab", ""].iter().map(|s| p.accept(s)).collect();
    let before_count = all_parsers(&p).len();
    remove_duplicates(&p);
    let after_acceptance: Vec<bool> = ["aaa", "aab", ""].iter().map(|s| p.accept(s)).collect();
    let after_count = all_parsers(&p).len();
    assert_eq!(before_acceptance, after_acceptance);
    assert!(after_count <= before_count);
}

#[test]
fn invariant_10_structural_eq_is_reflexive_symmetric_and_terminates_on_cycles() {
    let a = char('a');
    let b = char('a');
    let mut seen = HashSet::new();
    assert!(structural_eq(&a, &a, &mut seen));
    let mut seen = HashSet::new();
    assert!(structural_eq(&a, &b, &mut seen));
    let mut seen = HashSet::new();
    assert!(structural_eq(&b, &a, &mut seen));

    let cyclic = undefined_("cycle");
    let handle: ParserRef = cyclic.clone();
    cyclic.set(handle.clone().seq(char('x')));
    let mut seen = HashSet::new();
    assert!(structural_eq(&handle, &handle, &mut seen));
}

#[test]
fn round_trip_token_value_matches_plain_parse() {
    let p = letter().plus().flatten();
    let tokenized = p.clone().token().map(|v| match v {
        Value::Token(t) => (*t.value).clone(),
        other => other,
    });
    let plain_result = p.parse("abc");
    let token_result = tokenized.parse("abc");
    assert_eq!(plain_result.position(), token_result.position());
    assert_eq!(plain_result.value().unwrap(), token_result.value().unwrap());
}

#[test]
fn round_trip_flatten_returns_the_matched_substring() {
    let p = letter().plus().flatten();
    let result = p.parse("abcxyz");
    assert_eq!(result.value().unwrap(), Value::string("abcxyz"));
}
