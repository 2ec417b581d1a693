use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parmap::{
    monoid, CancelToken, Monoid, ParError, RayonThreadPool, Reducer, Result,
    SharedQueueThreadPool, ThreadPool,
};
use rand::Rng;

fn is_even(x: &i32) -> bool {
    x % 2 == 0
}

fn check_examples<P: ThreadPool>(reducer: &Reducer<P>) -> Result<()> {
    assert_eq!(reducer.join(5, vec!["a", "b", "c"])?, "abc");

    let values = vec![3, 1, 4, 1, 5, 9, 2, 6];
    assert_eq!(reducer.maximum(3, values.clone(), i32::cmp)?, 9);
    assert_eq!(reducer.minimum(3, values, i32::cmp)?, 1);

    assert!(reducer.all(4, vec![2, 4, 6, 8], is_even)?);
    assert!(!reducer.any(4, vec![1, 3, 5], is_even)?);
    assert!(!reducer.all(4, vec![2, 4, 5, 8], is_even)?);
    assert!(reducer.any(4, vec![1, 3, 6], is_even)?);
    Ok(())
}

fn check_order<P: ThreadPool>(reducer: &Reducer<P>) -> Result<()> {
    let values: Vec<i32> = (1..=100).collect();

    let evens = reducer.filter(7, values.clone(), is_even)?;
    assert_eq!(evens, (1..=50).map(|x| x * 2).collect::<Vec<_>>());

    let labels = reducer.map(7, values.clone(), |x: &i32| format!("<{x}>"))?;
    assert_eq!(labels, values.iter().map(|x| format!("<{x}>")).collect::<Vec<_>>());

    let joined = reducer.join(7, values.clone())?;
    assert_eq!(joined, values.iter().map(i32::to_string).collect::<String>());

    let words: Vec<String> = values.iter().map(|x| format!("{x},")).collect();
    let concatenated = reducer.reduce(6, words.clone(), monoid::concat())?;
    assert_eq!(concatenated, words.concat());

    let squares = reducer.map_reduce(4, values, |x: &i32| i64::from(*x) * i64::from(*x), monoid::sum())?;
    assert_eq!(squares, (1..=100i64).map(|x| x * x).sum::<i64>());
    Ok(())
}

fn check_empty_input<P: ThreadPool>(reducer: &Reducer<P>) -> Result<()> {
    let empty: Vec<i32> = Vec::new();

    assert!(matches!(
        reducer.maximum(2, empty.clone(), i32::cmp),
        Err(ParError::EmptyInput)
    ));
    assert!(matches!(
        reducer.minimum(2, empty.clone(), i32::cmp),
        Err(ParError::EmptyInput)
    ));
    assert!(reducer.all(2, empty.clone(), is_even)?);
    assert!(!reducer.any(2, empty.clone(), is_even)?);
    assert_eq!(reducer.join(2, empty.clone())?, "");
    assert!(reducer.filter(2, empty.clone(), is_even)?.is_empty());
    assert!(reducer.map(2, empty.clone(), |x: &i32| x + 1)?.is_empty());
    assert_eq!(reducer.reduce(2, empty, monoid::product(1))?, 1);
    Ok(())
}

fn check_zero_threads<P: ThreadPool>(reducer: &Reducer<P>) {
    let values = vec![1, 2, 3];
    assert!(matches!(
        reducer.maximum(0, values.clone(), i32::cmp),
        Err(ParError::InvalidThreadCount(0))
    ));
    assert!(matches!(
        reducer.maximum(0, Vec::<i32>::new(), i32::cmp),
        Err(ParError::InvalidThreadCount(0))
    ));
    assert!(matches!(
        reducer.all(0, values.clone(), is_even),
        Err(ParError::InvalidThreadCount(0))
    ));
    assert!(matches!(
        reducer.join(0, values.clone()),
        Err(ParError::InvalidThreadCount(0))
    ));
    assert!(matches!(
        reducer.reduce(0, values, monoid::sum()),
        Err(ParError::InvalidThreadCount(0))
    ));
}

fn check_all<P: ThreadPool>(reducer: &Reducer<P>) -> Result<()> {
    check_examples(reducer)?;
    check_order(reducer)?;
    check_empty_input(reducer)?;
    check_zero_threads(reducer);
    Ok(())
}

#[test]
fn ephemeral_reducer() -> Result<()> {
    check_all(&Reducer::new())
}

#[test]
fn shared_queue_reducer() -> Result<()> {
    let pool = Arc::new(SharedQueueThreadPool::new(3)?);
    check_all(&Reducer::with_pool(Arc::clone(&pool)))?;
    pool.close();
    Ok(())
}

#[test]
fn rayon_reducer() -> Result<()> {
    let pool = Arc::new(RayonThreadPool::new(3)?);
    check_all(&Reducer::with_pool(Arc::clone(&pool)))?;
    pool.close();
    Ok(())
}

#[test]
fn reduce_is_independent_of_thread_count() -> Result<()> {
    let pool = Arc::new(SharedQueueThreadPool::new(4)?);
    let pooled = Reducer::with_pool(Arc::clone(&pool));
    let ephemeral = Reducer::new();

    let mut rng = rand::thread_rng();
    let values: Vec<u64> = (0..1000).map(|_| rng.gen_range(0..1_000_000)).collect();
    let sequential: u64 = values.iter().sum();

    for threads in [1, 2, 3, 8, 13] {
        assert_eq!(pooled.reduce(threads, values.clone(), monoid::sum())?, sequential);
        assert_eq!(ephemeral.reduce(threads, values.clone(), monoid::sum())?, sequential);
    }
    Ok(())
}

#[test]
fn random_inputs_match_sequential() -> Result<()> {
    let reducer = Reducer::new();
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
        let len = rng.gen_range(0..60);
        let values: Vec<i32> = (0..len).map(|_| rng.gen_range(-50..50)).collect();
        let threads = rng.gen_range(1..10);

        assert_eq!(
            reducer.maximum(threads, values.clone(), i32::cmp).ok(),
            values.iter().copied().max()
        );
        assert_eq!(
            reducer.minimum(threads, values.clone(), i32::cmp).ok(),
            values.iter().copied().min()
        );
        assert_eq!(
            reducer.filter(threads, values.clone(), is_even)?,
            values.iter().copied().filter(is_even).collect::<Vec<_>>()
        );
        assert_eq!(
            reducer.any(threads, values.clone(), |x: &i32| *x > 40)?,
            values.iter().any(|x| *x > 40)
        );
    }
    Ok(())
}

#[test]
fn ties_keep_the_first_extreme() -> Result<()> {
    let reducer = Reducer::new();
    let pairs = vec![(1, 'a'), (3, 'b'), (0, 'c'), (3, 'd'), (0, 'e'), (2, 'f')];
    let by_key = |a: &(i32, char), b: &(i32, char)| a.0.cmp(&b.0);

    for threads in 1..=6 {
        assert_eq!(reducer.maximum(threads, pairs.clone(), by_key)?, (3, 'b'));
        assert_eq!(reducer.minimum(threads, pairs.clone(), by_key)?, (0, 'c'));
    }

    let pool = Arc::new(SharedQueueThreadPool::new(2)?);
    let pooled = Reducer::with_pool(Arc::clone(&pool));
    let spread = vec![(3, 'b'), (1, 'x'), (3, 'd')];
    for threads in 1..=3 {
        assert_eq!(reducer.maximum(threads, spread.clone(), by_key)?, (3, 'b'));
        assert_eq!(pooled.maximum(threads, spread.clone(), by_key)?, (3, 'b'));
        assert_eq!(pooled.minimum(threads, spread.clone(), by_key)?, (1, 'x'));
    }
    Ok(())
}

#[test]
fn non_commutative_monoid_keeps_slice_order() -> Result<()> {
    // 2x2 matrix product is associative but not commutative.
    type Matrix = [[i64; 2]; 2];
    fn mul(a: Matrix, b: Matrix) -> Matrix {
        let mut c = [[0; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                c[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j];
            }
        }
        c
    }
    let identity: Matrix = [[1, 0], [0, 1]];
    let values: Vec<Matrix> = (0..12).map(|k| [[1, k], [0, 1 + k % 2]]).collect();
    let expected = values.iter().fold(identity, |acc, m| mul(acc, *m));

    let pool = Arc::new(SharedQueueThreadPool::new(4)?);
    let reducer = Reducer::with_pool(Arc::clone(&pool));
    for threads in 1..=12 {
        let product = reducer.reduce(threads, values.clone(), Monoid::new(identity, mul))?;
        assert_eq!(product, expected);
    }
    Ok(())
}

#[test]
fn panicking_slice_fails_the_call() {
    let bad = |x: &i32| {
        if *x == 7 {
            panic_control::disable_hook_in_current_thread();
            panic!("cannot map {x}");
        }
        x * 10
    };

    let ephemeral = Reducer::new();
    assert!(matches!(
        ephemeral.map(4, (0..20).collect::<Vec<i32>>(), bad),
        Err(ParError::TaskPanicked { index: 1, .. })
    ));

    let pool = Arc::new(SharedQueueThreadPool::new(2).unwrap());
    let pooled = Reducer::with_pool(Arc::clone(&pool));
    assert!(matches!(
        pooled.map(4, (0..20).collect::<Vec<i32>>(), bad),
        Err(ParError::TaskPanicked { index: 1, .. })
    ));
    assert_eq!(pooled.map(4, vec![1, 2], |x: &i32| x * 10).unwrap(), vec![10, 20]);
}

#[test]
fn cancelled_reducer_does_no_work() {
    let token = CancelToken::new();
    token.cancel();
    let reducer = Reducer::new().with_cancel_token(token);
    assert!(reducer.cancel_token().is_cancelled());
    assert!(matches!(
        reducer.join(2, vec![1, 2, 3]),
        Err(ParError::Cancelled { .. })
    ));
}

#[test]
fn cancel_while_joining_slice_threads() {
    let (gate_tx, gate_rx) = crossbeam::channel::bounded::<()>(0);
    let reducer = Reducer::new();
    let token = reducer.cancel_token().clone();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        // The reducer joins its slice threads before returning.
        thread::sleep(Duration::from_millis(20));
        drop(gate_tx);
    });

    let outcome = reducer.all(3, vec![1, 2, 3], move |_: &i32| {
        let _ = gate_rx.recv();
        true
    });
    assert!(matches!(outcome, Err(ParError::Cancelled { .. })));
    canceller.join().unwrap();
}

#[test]
fn faults_during_cancel_cleanup_are_suppressed() {
    let (gate_tx, gate_rx) = crossbeam::channel::bounded::<()>(0);
    let reducer = Reducer::new();
    let token = reducer.cancel_token().clone();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
        thread::sleep(Duration::from_millis(20));
        drop(gate_tx);
    });

    let outcome = reducer.all(3, vec![1, 2, 3], move |x: &i32| {
        let _ = gate_rx.recv();
        if *x == 3 {
            panic_control::disable_hook_in_current_thread();
            panic!("late fault");
        }
        true
    });
    match outcome {
        Err(ParError::Cancelled { suppressed }) => {
            assert_eq!(suppressed, vec!["task 2: late fault".to_owned()]);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    canceller.join().unwrap();
}

#[test]
fn closed_pool_rejects_reductions() -> Result<()> {
    let pool = Arc::new(SharedQueueThreadPool::new(2)?);
    let reducer = Reducer::with_pool(Arc::clone(&pool));
    pool.close();
    assert!(matches!(
        reducer.join(2, vec![1, 2, 3]),
        Err(ParError::PoolClosed)
    ));
    Ok(())
}
