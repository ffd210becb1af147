use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use crate::context::{Context, ParseResult};
use crate::parser::{structural_eq, Parser, ParserRef};
use crate::setable::Setable;

fn identity(p: &ParserRef) -> usize {
    Rc::as_ptr(p) as *const () as usize
}

/// Depth-first enumeration of every distinct node reachable from `root`,
/// root included, each visited exactly once (`spec.md` §4.5).
pub fn all_parsers(root: &ParserRef) -> Vec<ParserRef> {
    let mut seen = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        if !seen.insert(identity(&node)) {
            continue;
        }
        order.push(node.clone());
        for child in node.children() {
            stack.push(child);
        }
    }
    order
}

/// Builds a disjoint, structurally-equivalent copy of the graph reachable
/// from `root`, applying `f` to each node's shallow copy before rewiring
/// children (`spec.md` §4.5).
///
/// Step 1 maps every original node to `f(node.copy())`. Step 2 repeatedly
/// walks the new graph and rewires any child pointer still aimed at an
/// original node to its image, until a full pass changes nothing, so `f` may
/// return a node whose children still refer to originals.
pub fn transform(root: &ParserRef, f: impl Fn(ParserRef) -> ParserRef) -> ParserRef {
    let originals = all_parsers(root);
    let mut mapping: HashMap<usize, ParserRef> = HashMap::new();
    for node in &originals {
        let image = f(node.copy());
        mapping.insert(identity(node), image);
    }

    loop {
        let mut changed = false;
        let mut seen = HashSet::new();
        let root_image = mapping[&identity(root)].clone();
        let mut stack = vec![root_image];
        while let Some(node) = stack.pop() {
            if !seen.insert(identity(&node)) {
                continue;
            }
            for child in node.children() {
                if let Some(target) = mapping.get(&identity(&child)) {
                    if !Rc::ptr_eq(&child, target) {
                        node.replace(&child, target);
                        changed = true;
                    }
                }
            }
            for child in node.children() {
                stack.push(child);
            }
        }
        if !changed {
            break;
        }
    }

    mapping[&identity(root)].clone()
}

/// Follows a node's chain of [`Setable`] indirections to its ultimate
/// non-`Setable` target. A chain that cycles back on itself (detected with
/// a seen-set) is left pointing at its own last link, per `spec.md` §4.5.
fn ultimate_target(node: &ParserRef) -> ParserRef {
    let mut seen = HashSet::new();
    let mut current = node.clone();
    loop {
        let Some(setable) = current.as_any().downcast_ref::<Setable>() else {
            return current;
        };
        if !seen.insert(identity(&current)) {
            return current;
        }
        current = setable.delegate();
    }
}

/// Rewrites every reachable child pointer to skip `Setable` indirections,
/// then returns `root`'s own ultimate target (`spec.md` §4.5).
pub fn remove_setables(root: &ParserRef) -> ParserRef {
    for node in all_parsers(root) {
        for child in node.children() {
            let target = ultimate_target(&child);
            if !Rc::ptr_eq(&child, &target) {
                node.replace(&child, &target);
            }
        }
    }
    ultimate_target(root)
}

/// Rewrites every reachable child pointer that is structurally equal but
/// not identity-equal to an already-seen "canonical" node, to point at that
/// canonical instead (`spec.md` §4.5). Monotonically shrinks the reachable
/// set without changing acceptance.
pub fn remove_duplicates(root: &ParserRef) {
    let mut canonical: Vec<ParserRef> = Vec::new();
    for node in all_parsers(root) {
        let children = node.children();
        for child in children {
            if canonical.iter().any(|c| Rc::ptr_eq(c, &child)) {
                continue;
            }
            let mut seen = HashSet::new();
            if let Some(equal) = canonical
                .iter()
                .find(|c| structural_eq(c, &child, &mut seen))
            {
                node.replace(&child, equal);
            } else {
                canonical.push(child);
            }
        }
    }
}

/// A delegating parser whose `parse_on` runs a user handler of
/// `(ctx, continuation)`, where `continuation(ctx)` runs the wrapped
/// delegate (`spec.md` §4.5). Backs `debug`, `progress`, and `profile`.
pub struct Continuation {
    delegate: RefCell<ParserRef>,
    handler: Rc<dyn Fn(&Context, &dyn Fn(&Context) -> ParseResult) -> ParseResult>,
    label: String,
}

impl Parser for Continuation {
    fn parse_on(&self, ctx: &Context) -> ParseResult {
        let delegate = self.delegate.borrow().clone();
        let continuation = move |c: &Context| delegate.parse_on(c);
        (self.handler)(ctx, &continuation)
    }

    fn children(&self) -> Vec<ParserRef> {
        vec![self.delegate.borrow().clone()]
    }

    fn replace(&self, source: &ParserRef, target: &ParserRef) {
        let matches = Rc::ptr_eq(&*self.delegate.borrow(), source);
        if matches {
            *self.delegate.borrow_mut() = target.clone();
        }
    }

    fn copy(&self) -> ParserRef {
        Rc::new(Continuation {
            delegate: RefCell::new(self.delegate.borrow().clone()),
            handler: self.handler.clone(),
            label: self.label.clone(),
        })
    }

    fn match_scalar(&self, other: &dyn Any) -> bool {
        other
            .downcast_ref::<Continuation>()
            .map(|o| Rc::ptr_eq(&o.handler, &self.handler))
            .unwrap_or(false)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn label(&self) -> String {
        self.label.clone()
    }
}

fn wrap_all(
    root: &ParserRef,
    label: &'static str,
    handler: Rc<dyn Fn(&Context, &dyn Fn(&Context) -> ParseResult) -> ParseResult>,
) -> ParserRef {
    transform(root, move |node| {
        Rc::new(Continuation {
            delegate: RefCell::new(node),
            handler: handler.clone(),
            label: label.to_string(),
        })
    })
}

/// Wraps every reachable node with an indented trace of entry/exit, calling
/// through to `entering`/`leaving`.
pub fn debug(root: &ParserRef) -> ParserRef {
    let depth = Rc::new(Cell::new(0usize));
    wrap_all(
        root,
        "debug",
        Rc::new(move |ctx: &Context, continuation| {
            let indent = "  ".repeat(depth.get());
            eprintln!("{indent}> at {}", ctx.position());
            depth.set(depth.get() + 1);
            let result = continuation(ctx);
            depth.set(depth.get().saturating_sub(1));
            let indent = "  ".repeat(depth.get());
            eprintln!("{indent}< {} at {}", result.is_success(), result.position());
            result
        }),
    )
}

/// Wraps every reachable node with a position marker printed on entry.
pub fn progress(root: &ParserRef) -> ParserRef {
    wrap_all(
        root,
        "progress",
        Rc::new(move |ctx: &Context, continuation| {
            eprintln!("@{}", ctx.position());
            continuation(ctx)
        }),
    )
}

/// A single node's accumulated profiling counters.
#[derive(Clone, Copy, Default)]
pub struct ProfileStats {
    pub invocations: u64,
    pub cumulative: Duration,
}

/// Wraps every reachable node with an invocation counter and cumulative
/// timer, keyed by node identity. `stats` gives a snapshot at any time.
pub struct Profile {
    counts: Rc<RefCell<HashMap<usize, ProfileStats>>>,
    root: ParserRef,
}

impl Profile {
    pub fn stats(&self) -> HashMap<usize, ProfileStats> {
        self.counts.borrow().clone()
    }

    pub fn root(&self) -> ParserRef {
        self.root.clone()
    }
}

pub fn profile(root: &ParserRef) -> Profile {
    let counts: Rc<RefCell<HashMap<usize, ProfileStats>>> = Rc::new(RefCell::new(HashMap::new()));
    let counts_for_wrap = counts.clone();
    let wrapped = transform(root, move |node| {
        let key = identity(&node);
        let counts = counts_for_wrap.clone();
        Rc::new(Continuation {
            delegate: RefCell::new(node),
            handler: Rc::new(move |ctx: &Context, continuation| {
                let start = std::time::Instant::now();
                let result = continuation(ctx);
                let elapsed = start.elapsed();
                let mut table = counts.borrow_mut();
                let entry = table.entry(key).or_insert_with(ProfileStats::default);
                entry.invocations += 1;
                entry.cumulative += elapsed;
                result
            }),
            label: "profile".to_string(),
        })
    });
    Profile {
        counts,
        root: wrapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use crate::primitive::char_parser;

    #[test]
    fn all_parsers_visits_each_node_once_through_a_shared_child() {
        let shared = char_parser('a');
        let root = shared.clone().seq(shared.clone());
        let nodes = all_parsers(&root);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn transform_identity_produces_disjoint_but_equal_graph() {
        let root = char_parser('a').seq(char_parser('b'));
        let copy = transform(&root, |n| n);
        assert!(!Rc::ptr_eq(&root, &copy));
        let mut seen = HashSet::new();
        assert!(structural_eq(&root, &copy, &mut seen));
    }

    #[test]
    fn remove_setables_skips_indirection() {
        let setable = Setable::undefined("x");
        let handle: ParserRef = setable.clone();
        setable.set(char_parser('a'));
        let root = handle.seq(char_parser('b'));
        let cleaned = remove_setables(&root);
        assert!(cleaned.accept("ab"));
        assert!(all_parsers(&cleaned)
            .iter()
            .all(|n| n.as_any().downcast_ref::<Setable>().is_none()));
    }

    #[test]
    fn remove_duplicates_shrinks_reachable_set() {
        let root = char_parser('a').seq(char_parser('a'));
        let before = all_parsers(&root).len();
        remove_duplicates(&root);
        let after = all_parsers(&root).len();
        assert!(after < before);
    }

    #[test]
    fn profile_counts_invocations() {
        let root = char_parser('a').star();
        let wrapped = profile(&root);
        let _ = wrapped.root().parse("aaa");
        assert!(wrapped.stats().values().any(|s| s.invocations > 0));
    }
}
