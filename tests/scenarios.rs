use combinators::prelude::*;
use combinators::Value;

#[test]
fn scenario_1_letter_plus_accepts_all_letters() {
    let result = letter().plus().parse("abc");
    assert!(result.is_success());
    assert_eq!(result.position(), 3);
    let value = result.value().unwrap();
    assert_eq!(
        value,
        Value::List(vec![Value::Char('a'), Value::Char('b'), Value::Char('c')])
    );
}

#[test]
fn scenario_2_letter_plus_rejects_digits() {
    let result = letter().plus().parse("123");
    assert!(result.is_failure());
    assert_eq!(result.position(), 0);
    assert_eq!(result.as_failure().unwrap().message, "letter expected");
}

#[test]
fn scenario_3_digits_separated_by_comma() {
    let grammar = digit().separated_by(char(','), false, false);
    let result = grammar.parse("1,2,3");
    assert!(result.is_success());
    assert_eq!(result.position(), 5);
    let value = result.value().unwrap();
    assert_eq!(
        value,
        Value::List(vec![Value::Char('1'), Value::Char('2'), Value::Char('3')])
    );
}

#[test]
fn scenario_4_flatten_then_end() {
    let grammar = letter().plus().flatten().end("expected end of input");
    let result = grammar.parse("abc");
    assert!(result.is_success());
    assert_eq!(result.position(), 3);
    assert_eq!(result.value().unwrap(), Value::string("abc"));
}

#[test]
fn scenario_5_composite_grammar_parses_a_comma_separated_int_list() {
    let grammar = build_composite(|b| {
        b.def("elt", digit().plus().flatten())?;
        b.action("elt", |v| {
            let s = v.as_slice().unwrap_or_default();
            Value::dyn_value(s.parse::<i64>().unwrap_or(0))
        })?;
        b.def("list", b.ref_("elt").separated_by(char(','), false, false))?;
        b.def("start", b.ref_("list").end("expected end of input"))?;
        Ok(())
    })
    .unwrap();

    let result = grammar.parse("1,22,333");
    assert!(result.is_success());
    let value = result.value().unwrap();
    let items = value.into_list().unwrap();
    let ints: Vec<i64> = items
        .iter()
        .map(|v| *v.downcast_ref::<i64>().unwrap())
        .collect();
    assert_eq!(ints, vec![1, 22, 333]);
}

#[test]
fn scenario_6_left_recursive_setable_knot() {
    let p = undefined_("p not yet defined");
    let handle: ParserRef = p.clone();
    p.set(char('a').seq(handle.clone()).or(char('a')));
    let result = handle.parse("aaab");
    assert!(result.is_success());
    assert_eq!(result.position(), 3);
}

#[test]
fn scenario_7_greedy_repeat_backtracks_for_its_limit() {
    let grammar = char('a').star_greedy(char('a').seq(char('b')));
    let result = grammar.parse("aaab");
    assert!(result.is_success());
    assert_eq!(result.position(), 2);
}

#[test]
fn scenario_8_lazy_repeat_stops_as_soon_as_its_limit_matches() {
    let grammar = char('a').star_lazy(char('b'));
    let result = grammar.parse("aaab");
    assert!(result.is_success());
    assert_eq!(result.position(), 3);
}
