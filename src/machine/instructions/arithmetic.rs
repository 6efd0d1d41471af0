//! Arithmetic, comparison, and the opaque math-library delegates.
//!
//! Grounded on `original_source/vm/src/vm/instructions/arith.cpp` for the
//! `MOD` (Euclidean, always non-negative) vs. `REM` (truncating, sign of
//! the dividend) distinction, and on `Value::zip_numeric`/`Value::compare`
//! (spec.md §4.6) for tuple broadcasting. Trigonometric/log/pow/sqrt are
//! opaque calls into the host's math library per spec.md §1 — `std::f32`
//! stands in for whatever the platform provides.

use crate::error::VmResult;
use crate::host::Platform;
use crate::value::Value;

use super::super::Machine;

impl<P: Platform> Machine<P> {
    pub(crate) fn binary_numeric(&mut self, f: impl Fn(f32, f32) -> f32 + Copy) -> VmResult<()> {
        let b = self.exec.pop()?;
        let a = self.exec.pop()?;
        self.exec.push(Value::zip_numeric(&a, &b, f))
    }

    pub(crate) fn unary_numeric(&mut self, f: impl Fn(f32) -> f32 + Copy) -> VmResult<()> {
        let a = self.exec.pop()?;
        self.exec.push(Value::map_numeric(&a, f))
    }

    pub(crate) fn op_dot(&mut self) -> VmResult<()> {
        // Dot product: zero-padded element-wise multiply, then sum.
        let b = self.exec.pop()?;
        let a = self.exec.pop()?;
        let product = Value::zip_numeric(&a, &b, |x, y| x * y);
        let sum = match &product {
            Value::Tuple(t) => t.borrow().iter().filter_map(Value::as_number).sum(),
            Value::Number(n) => *n,
            _ => 0.0,
        };
        self.exec.push(Value::Number(sum))
    }

    pub(crate) fn op_eq(&mut self) -> VmResult<()> {
        let b = self.exec.pop()?;
        let a = self.exec.pop()?;
        self.exec.push(Value::boolean(Value::numeric_eq(&a, &b)))
    }

    pub(crate) fn op_neq(&mut self) -> VmResult<()> {
        let b = self.exec.pop()?;
        let a = self.exec.pop()?;
        self.exec.push(Value::boolean(!Value::numeric_eq(&a, &b)))
    }

    pub(crate) fn op_compare(&mut self, pred: impl Fn(std::cmp::Ordering) -> bool) -> VmResult<()> {
        let b = self.exec.pop()?;
        let a = self.exec.pop()?;
        self.exec.push(Value::boolean(pred(Value::compare(&a, &b))))
    }

    pub(crate) fn op_not(&mut self) -> VmResult<()> {
        let a = self.exec.pop()?;
        self.exec.push(Value::boolean(!a.is_truthy()))
    }

    /// `RND`: pop `max` then `min`, push a uniform value in `[min, max)`.
    /// On tuple operands this recurses element-wise with zero-padding, like
    /// every other extended-mode arithmetic op (spec.md §4.6;
    /// `original_source/vm/src/vm/instructions/math.cpp`'s `RND`).
    pub(crate) fn op_rnd(&mut self) -> VmResult<()> {
        let max = self.exec.pop()?;
        let min = self.exec.pop()?;
        let result = self.random_value(&min, &max);
        self.exec.push(result)
    }

    fn random_value(&mut self, min: &Value, max: &Value) -> Value {
        match (min, max) {
            (Value::Number(a), Value::Number(b)) => Value::Number(self.random_between(*a, *b)),
            (Value::Tuple(a), Value::Tuple(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                let len = a.len().max(b.len());
                let elements = (0..len)
                    .map(|i| {
                        let av = a.get(i).cloned().unwrap_or(Value::Number(0.0));
                        let bv = b.get(i).cloned().unwrap_or(Value::Number(0.0));
                        self.random_value(&av, &bv)
                    })
                    .collect();
                Value::tuple(elements)
            }
            (Value::Tuple(a), Value::Number(_)) => {
                let elements = a.borrow().clone();
                let elements = elements.into_iter().map(|av| self.random_value(&av, max)).collect();
                Value::tuple(elements)
            }
            (Value::Number(_), Value::Tuple(b)) => {
                let elements = b.borrow().clone();
                let elements = elements.into_iter().map(|bv| self.random_value(min, &bv)).collect();
                Value::tuple(elements)
            }
            _ => Value::Undefined,
        }
    }

    fn random_between(&mut self, a: f32, b: f32) -> f32 {
        a + self.platform.random() * (b - a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullPlatform;

    /// spec.md §8: `MOD(a,b)` returns a value in `[0, |b|)` for all finite
    /// `a,b≠0`, unlike `REM`'s truncating (sign-of-dividend) remainder.
    #[test]
    fn mod_is_euclidean_and_always_non_negative() {
        let mut m = Machine::new(1, NullPlatform::default());
        m.exec.reset(8);
        for (a, b) in [(7.0, 3.0), (-7.0, 3.0), (7.0, -3.0), (-7.0, -3.0), (0.5, 0.3)] {
            m.exec.push(Value::Number(a)).unwrap();
            m.exec.push(Value::Number(b)).unwrap();
            m.binary_numeric(|x, y| x.rem_euclid(y)).unwrap();
            let r = m.exec.pop().unwrap().as_number().unwrap();
            assert!(r >= 0.0 && r < b.abs(), "MOD({a}, {b}) = {r} not in [0, {})", b.abs());
        }
    }

    #[test]
    fn rem_keeps_sign_of_dividend_unlike_mod() {
        let mut m = Machine::new(1, NullPlatform::default());
        m.exec.reset(8);
        m.exec.push(Value::Number(-7.0)).unwrap();
        m.exec.push(Value::Number(3.0)).unwrap();
        m.binary_numeric(|x, y| x % y).unwrap();
        let r = m.exec.pop().unwrap().as_number().unwrap();
        assert!(r < 0.0, "REM should keep the dividend's sign, got {r}");
    }
}
