//! The tagged value model (C1).
//!
//! A [`Value`] is the one data type that flows through every stack, state
//! cell, global, and neighbor import in the VM. It is a closed tagged union:
//! `Undefined`, `Number`, `Address`, and `Tuple`. Booleans are encoded as
//! numbers (`0.0` is false, anything else is true).
//!
//! Tuples are the one variant with reference semantics: cloning a `Value`
//! aliases a tuple's heap storage (see [`Value::copy`] for the explicit
//! deep-copy escape hatch). The refcount is a plain `Rc`, not `Arc` —
//! correct and cheaper here because a `Machine` and everything it owns never
//! crosses an OS thread boundary (spec.md §5, §9).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use itertools::{EitherOrBoth, Itertools};

/// A growable, reference-counted, single-threaded tuple backing store.
pub type TupleData = Rc<RefCell<Vec<Value>>>;

/// The VM's only data type.
#[derive(Debug, Clone)]
pub enum Value {
    /// The "not set" bottom value. State cells start here; `fold-hood` skips
    /// neighbor imports that are still `Undefined`.
    Undefined,
    /// An IEEE-754 binary32 float. Doubles as the boolean encoding.
    Number(f32),
    /// A byte offset into the currently installed script. Never valid
    /// outside the `Machine` that produced it.
    Address(usize),
    /// A handle onto a heap tuple, aliased on `Clone`.
    Tuple(TupleData),
}

impl Value {
    pub fn number(n: f32) -> Value {
        Value::Number(n)
    }

    pub fn boolean(b: bool) -> Value {
        Value::Number(if b { 1.0 } else { 0.0 })
    }

    pub fn tuple(values: Vec<Value>) -> Value {
        Value::Tuple(Rc::new(RefCell::new(values)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Number(_) => "number",
            Value::Address(_) => "address",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<usize> {
        match self {
            Value::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&TupleData> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Value::Tuple(t) => t.borrow().len(),
            _ => 1,
        }
    }

    /// Invariant V2: deep-copy a tuple element-wise; everything else is a
    /// plain (already-value) copy.
    pub fn copy(&self) -> Value {
        match self {
            Value::Tuple(t) => {
                let elements: Vec<Value> = t.borrow().iter().map(Value::copy).collect();
                Value::tuple(elements)
            }
            other => other.clone(),
        }
    }

    /// Append `v` to this tuple in place. All handles aliasing this tuple
    /// observe the new length (invariant in spec.md §8).
    pub fn push(&self, v: Value) {
        match self {
            Value::Tuple(t) => t.borrow_mut().push(v),
            _ => panic!("push() called on a non-tuple Value"),
        }
    }

    pub fn instances(&self) -> usize {
        match self {
            Value::Tuple(t) => Rc::strong_count(t),
            _ => 1,
        }
    }

    /// Element-wise numeric op with zero-padding of the shorter tuple (or
    /// scalar broadcast when one side is a plain number), per spec.md §4.6.
    pub fn zip_numeric(a: &Value, b: &Value, f: impl Fn(f32, f32) -> f32 + Copy) -> Value {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => Value::Number(f(*x, *y)),
            (Value::Tuple(_), Value::Number(y)) => Value::map_numeric(a, |x| f(x, *y)),
            (Value::Number(x), Value::Tuple(_)) => Value::map_numeric(b, |y| f(*x, y)),
            (Value::Tuple(x), Value::Tuple(y)) => {
                let xs = x.borrow();
                let ys = y.borrow();
                let elements = xs
                    .iter()
                    .zip_longest(ys.iter())
                    .map(|pair| match pair {
                        EitherOrBoth::Both(l, r) => Value::zip_numeric(l, r, f),
                        EitherOrBoth::Left(l) => Value::zip_numeric(l, &Value::Number(0.0), f),
                        EitherOrBoth::Right(r) => Value::zip_numeric(&Value::Number(0.0), r, f),
                    })
                    .collect();
                Value::tuple(elements)
            }
            _ => Value::Undefined,
        }
    }

    pub fn map_numeric(a: &Value, f: impl Fn(f32) -> f32 + Copy) -> Value {
        match a {
            Value::Number(x) => Value::Number(f(*x)),
            Value::Tuple(t) => {
                let elements = t.borrow().iter().map(|v| Value::map_numeric(v, f)).collect();
                Value::tuple(elements)
            }
            _ => Value::Undefined,
        }
    }

    /// Lexicographic comparison for `LT`/`LTE`/`GT`/`GTE` on tuples;
    /// numeric comparison otherwise. Shorter tuples are zero-padded like
    /// arithmetic (spec.md §4.6).
    pub fn compare(a: &Value, b: &Value) -> std::cmp::Ordering {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal)
            }
            (Value::Tuple(x), Value::Tuple(y)) => {
                let xs = x.borrow();
                let ys = y.borrow();
                for pair in xs.iter().zip_longest(ys.iter()) {
                    let (l, r) = match pair {
                        EitherOrBoth::Both(l, r) => (l.clone(), r.clone()),
                        EitherOrBoth::Left(l) => (l.clone(), Value::Number(0.0)),
                        EitherOrBoth::Right(r) => (Value::Number(0.0), r.clone()),
                    };
                    let ord = Value::compare(&l, &r);
                    if ord != std::cmp::Ordering::Equal {
                        return ord;
                    }
                }
                std::cmp::Ordering::Equal
            }
            (Value::Tuple(_), Value::Number(_)) => {
                Value::compare(a, &Value::tuple(vec![b.clone()]))
            }
            (Value::Number(_), Value::Tuple(_)) => {
                Value::compare(&Value::tuple(vec![a.clone()]), b)
            }
            _ => std::cmp::Ordering::Equal,
        }
    }

    pub fn numeric_eq(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Address(x), Value::Address(y)) => x == y,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Tuple(_), Value::Tuple(_)) | (Value::Tuple(_), Value::Number(_))
            | (Value::Number(_), Value::Tuple(_)) => Value::compare(a, b) == std::cmp::Ordering::Equal,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Address(a) => write!(f, "@{a:#x}"),
            Value::Tuple(t) => {
                write!(f, "(")?;
                for (i, v) in t.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_is_element_wise_and_independent() {
        let t = Value::tuple(vec![Value::Number(1.0), Value::Number(2.0)]);
        let c = t.copy();
        assert_eq!(c.len(), t.len());
        assert_eq!(c.instances(), 1);
        c.push(Value::Number(3.0));
        assert_eq!(t.len(), 2);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn alias_observes_push() {
        let t = Value::tuple(vec![Value::Number(1.0)]);
        let alias = t.clone();
        t.push(Value::Number(2.0));
        assert_eq!(alias.len(), 2);
        assert_eq!(t.instances(), 2);
    }

    #[test]
    fn zero_padded_add() {
        let a = Value::tuple(vec![Value::Number(1.0), Value::Number(2.0)]);
        let b = Value::tuple(vec![Value::Number(10.0)]);
        let sum = Value::zip_numeric(&a, &b, |x, y| x + y);
        let t = sum.as_tuple().unwrap().borrow();
        assert_eq!(t[0].as_number(), Some(11.0));
        assert_eq!(t[1].as_number(), Some(2.0));
    }
}
