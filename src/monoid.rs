use std::ops::{Add, Mul};

/// An identity element together with an associative operator.
///
/// Parallel reductions fold each slice independently and then fold the
/// slice results, so the operator must be associative. Commutativity is not
/// required: partial results are always combined left to right.
#[derive(Clone)]
pub struct Monoid<T, F> {
    identity: T,
    operator: F,
}

impl<T, F> Monoid<T, F>
where
    T: Clone,
    F: Fn(T, T) -> T,
{
    /// Creates a monoid from its identity and operator.
    pub fn new(identity: T, operator: F) -> Self {
        Monoid { identity, operator }
    }

    /// Returns a copy of the identity element.
    pub fn identity(&self) -> T {
        self.identity.clone()
    }

    /// Combines two values.
    pub fn combine(&self, left: T, right: T) -> T {
        (self.operator)(left, right)
    }

    /// Folds `items` left to right, starting from the identity.
    pub fn fold<I>(&self, items: I) -> T
    where
        I: IntoIterator<Item = T>,
    {
        items
            .into_iter()
            .fold(self.identity(), |acc, item| self.combine(acc, item))
    }
}

/// Addition with zero (`Default`) as identity.
pub fn sum<T>() -> Monoid<T, fn(T, T) -> T>
where
    T: Add<Output = T> + Default + Clone,
{
    let add: fn(T, T) -> T = |a, b| a + b;
    Monoid::new(T::default(), add)
}

/// Multiplication with `one` as identity.
pub fn product<T>(one: T) -> Monoid<T, fn(T, T) -> T>
where
    T: Mul<Output = T> + Clone,
{
    let mul: fn(T, T) -> T = |a, b| a * b;
    Monoid::new(one, mul)
}

/// String concatenation with the empty string as identity.
pub fn concat() -> Monoid<String, fn(String, String) -> String> {
    let append: fn(String, String) -> String = |mut a, b| {
        a.push_str(&b);
        a
    };
    Monoid::new(String::new(), append)
}
