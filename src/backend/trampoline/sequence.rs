//! Bounded walks over sequences
//!
//! Both helpers take exactly one bounce per element, so a step that answers
//! synchronously still yields to the driver once the yoke reaches its limit.

use std::rc::Rc;
use std::vec;

use super::types::{Cont, Outcome, Yoke};

/// CPS step mapping one element
pub type Step<A, B> = Rc<dyn Fn(&mut Yoke, A, Cont<B>) -> Outcome>;

/// CPS step folding one element into an accumulator
pub type FoldStep<S, A> = Rc<dyn Fn(&mut Yoke, S, A, Cont<S>) -> Outcome>;

/// Apply `step` to each item left to right and deliver the results in order.
pub fn map_bounded<A, B>(yoke: &mut Yoke, items: Vec<A>, step: Step<A, B>, k: Cont<Vec<B>>) -> Outcome
where
    A: 'static,
    B: 'static,
{
    let out = Vec::with_capacity(items.len());
    map_next(yoke, items.into_iter(), out, step, k)
}

fn map_next<A, B>(
    yoke: &mut Yoke,
    mut rest: vec::IntoIter<A>,
    mut out: Vec<B>,
    step: Step<A, B>,
    k: Cont<Vec<B>>,
) -> Outcome
where
    A: 'static,
    B: 'static,
{
    yoke.bounce(move |yoke: &mut Yoke| match rest.next() {
        None => k.call(yoke, out),
        Some(item) => {
            let again = Rc::clone(&step);
            (*step)(
                yoke,
                item,
                Cont::new(move |yoke: &mut Yoke, mapped: B| {
                    out.push(mapped);
                    map_next(yoke, rest, out, again, k)
                }),
            )
        }
    })
}

/// Thread `init` through `step` for each item left to right.
pub fn fold_bounded<S, A>(
    yoke: &mut Yoke,
    items: Vec<A>,
    init: S,
    step: FoldStep<S, A>,
    k: Cont<S>,
) -> Outcome
where
    S: 'static,
    A: 'static,
{
    fold_next(yoke, items.into_iter(), init, step, k)
}

fn fold_next<S, A>(
    yoke: &mut Yoke,
    mut rest: vec::IntoIter<A>,
    acc: S,
    step: FoldStep<S, A>,
    k: Cont<S>,
) -> Outcome
where
    S: 'static,
    A: 'static,
{
    yoke.bounce(move |yoke: &mut Yoke| match rest.next() {
        None => k.call(yoke, acc),
        Some(item) => {
            let again = Rc::clone(&step);
            (*step)(
                yoke,
                acc,
                item,
                Cont::new(move |yoke: &mut Yoke, acc: S| fold_next(yoke, rest, acc, again, k)),
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::trampoline::run_bounded;

    #[test]
    fn test_map_bounded_preserves_order() {
        let result = run_bounded((), 2, |yoke: &mut Yoke, finish: Cont<Vec<u32>>| {
            let double: Step<u32, u32> =
                Rc::new(|yoke: &mut Yoke, n: u32, k: Cont<u32>| yoke.resume(k, n * 2));
            map_bounded(yoke, vec![1, 2, 3, 4], double, finish)
        });
        assert_eq!(result, Ok(vec![2, 4, 6, 8]));
    }

    #[test]
    fn test_map_bounded_empty() {
        let result = run_bounded((), 1, |yoke: &mut Yoke, finish: Cont<Vec<u8>>| {
            let id: Step<u8, u8> = Rc::new(|yoke: &mut Yoke, n: u8, k: Cont<u8>| k.call(yoke, n));
            map_bounded(yoke, Vec::new(), id, finish)
        });
        assert_eq!(result, Ok(Vec::new()));
    }

    #[test]
    fn test_map_bounded_long_input_limit_one() {
        let items: Vec<u64> = (0..50_000).collect();
        let result = run_bounded((), 1, move |yoke: &mut Yoke, finish: Cont<Vec<u64>>| {
            let inc: Step<u64, u64> = Rc::new(|yoke: &mut Yoke, n: u64, k: Cont<u64>| k.call(yoke, n + 1));
            map_bounded(yoke, items, inc, finish)
        })
        .unwrap();
        assert_eq!(result.len(), 50_000);
        assert_eq!(result[49_999], 50_000);
    }

    #[test]
    fn test_fold_bounded_sums_left_to_right() {
        let items: Vec<u64> = (1..=10_000).collect();
        let result = run_bounded((), 3, move |yoke: &mut Yoke, finish: Cont<(u64, Option<u64>)>| {
            let step: FoldStep<(u64, Option<u64>), u64> = Rc::new(
                |yoke: &mut Yoke, (sum, last): (u64, Option<u64>), n: u64, k: Cont<(u64, Option<u64>)>| {
                    assert!(last.map_or(true, |prev| prev < n));
                    k.call(yoke, (sum + n, Some(n)))
                },
            );
            fold_bounded(yoke, items, (0, None), step, finish)
        });
        assert_eq!(result, Ok((50_005_000, Some(10_000))));
    }
}
