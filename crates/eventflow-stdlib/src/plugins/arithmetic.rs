//! Whole number arithmetic.
//!
//! Every argument is promoted with [`PluginValue::promote_integer`], so `"2"` and `2` are
//! interchangeable. Results that do not fit in 64 bits are evaluation errors, never wrapped.

use super::{at_least, exactly, map_each, overflow};
use eventflow_core::{PluginError, PluginValue, SimplePlugin};
use std::sync::Arc;

fn promote_all(args: &[PluginValue]) -> Result<Vec<i64>, PluginError> {
    args.iter().map(PluginValue::promote_integer).collect()
}

fn fold(
    plugin: &str,
    numbers: &[i64],
    op: fn(i64, i64) -> Option<i64>,
) -> Result<PluginValue, PluginError> {
    let (first, rest) = numbers
        .split_first()
        .ok_or_else(|| super::arity(plugin, "at least 1", 0))?;
    rest.iter()
        .try_fold(*first, |acc, n| op(acc, *n))
        .map(PluginValue::Integer)
        .ok_or_else(|| overflow(plugin))
}

/// `add(a, ...)`: sum of all arguments
pub struct Add;

impl SimplePlugin for Add {
    fn name(&self) -> &str {
        "add"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        at_least(self.name(), args, 1, "at least 1")?;
        fold(self.name(), &promote_all(args)?, i64::checked_add)
    }
}

/// `subtract(a, b, ...)`: `a - b - ...`
pub struct Subtract;

impl SimplePlugin for Subtract {
    fn name(&self) -> &str {
        "subtract"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        at_least(self.name(), args, 2, "at least 2")?;
        fold(self.name(), &promote_all(args)?, i64::checked_sub)
    }
}

/// `multiply(a, ...)`: product of all arguments
pub struct Multiply;

impl SimplePlugin for Multiply {
    fn name(&self) -> &str {
        "multiply"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        at_least(self.name(), args, 1, "at least 1")?;
        fold(self.name(), &promote_all(args)?, i64::checked_mul)
    }
}

/// `div(a, b, ...)`: integer division, left to right.
///
/// All divisors are checked before anything is divided.
pub struct Divide;

impl SimplePlugin for Divide {
    fn name(&self) -> &str {
        "div"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        at_least(self.name(), args, 2, "at least 2")?;
        let numbers = promote_all(args)?;
        if numbers[1..].contains(&0) {
            return Err(PluginError::DivisionByZero(self.name().to_string()));
        }
        fold(self.name(), &numbers, i64::checked_div)
    }
}

/// `mod(a, b)`: remainder of `a / b`
pub struct Modulus;

impl SimplePlugin for Modulus {
    fn name(&self) -> &str {
        "mod"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        exactly(self.name(), args, 2, "exactly 2")?;
        let numbers = promote_all(args)?;
        if numbers[1] == 0 {
            return Err(PluginError::DivisionByZero(self.name().to_string()));
        }
        fold(self.name(), &numbers, i64::checked_rem)
    }
}

/// `increment(a, ...)`: every argument plus one
pub struct Increment;

impl SimplePlugin for Increment {
    fn name(&self) -> &str {
        "increment"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        map_each(self.name(), args, |value| {
            value
                .promote_integer()?
                .checked_add(1)
                .map(PluginValue::Integer)
                .ok_or_else(|| overflow("increment"))
        })
    }
}

/// `decrement(a, ...)`: every argument minus one
pub struct Decrement;

impl SimplePlugin for Decrement {
    fn name(&self) -> &str {
        "decrement"
    }

    fn calculate(&self, args: &[PluginValue]) -> Result<PluginValue, PluginError> {
        map_each(self.name(), args, |value| {
            value
                .promote_integer()?
                .checked_sub(1)
                .map(PluginValue::Integer)
                .ok_or_else(|| overflow("decrement"))
        })
    }
}

pub(crate) fn plugins() -> Vec<Arc<dyn SimplePlugin>> {
    vec![
        Arc::new(Add),
        Arc::new(Subtract),
        Arc::new(Multiply),
        Arc::new(Divide),
        Arc::new(Modulus),
        Arc::new(Increment),
        Arc::new(Decrement),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use eventflow_core::PluginValue::{Integer, Text};

    fn text(s: &str) -> PluginValue {
        Text(s.to_string())
    }

    #[test]
    fn test_add_promotes_text() {
        assert_eq!(Add.calculate(&[Integer(2), Integer(2)]).unwrap(), Integer(4));
        assert_eq!(Add.calculate(&[text("2"), Integer(2)]).unwrap(), Integer(4));
        assert_eq!(Add.calculate(&[text(" 7 ")]).unwrap(), Integer(7));
        assert!(matches!(
            Add.calculate(&[]),
            Err(PluginError::Arity { actual: 0, .. })
        ));
        assert!(matches!(
            Add.calculate(&[text("two")]),
            Err(PluginError::TypePromotion { .. })
        ));
    }

    #[test]
    fn test_subtract_and_multiply() {
        assert_eq!(
            Subtract.calculate(&[Integer(10), Integer(3), Integer(2)]).unwrap(),
            Integer(5)
        );
        assert!(Subtract.calculate(&[Integer(10)]).is_err());
        assert_eq!(
            Multiply.calculate(&[Integer(3), text("4")]).unwrap(),
            Integer(12)
        );
    }

    #[test]
    fn test_division_checks_every_divisor_first() {
        assert_eq!(
            Divide.calculate(&[Integer(100), Integer(5), Integer(2)]).unwrap(),
            Integer(10)
        );
        assert!(matches!(
            Divide.calculate(&[Integer(10), Integer(0)]),
            Err(PluginError::DivisionByZero(_))
        ));
        // the zero comes after a divisor that would have overflowed
        assert!(matches!(
            Divide.calculate(&[Integer(i64::MIN), Integer(-1), Integer(0)]),
            Err(PluginError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_mod_arity_and_zero() {
        assert_eq!(Modulus.calculate(&[Integer(10), Integer(3)]).unwrap(), Integer(1));
        assert!(matches!(
            Modulus.calculate(&[Integer(10)]),
            Err(PluginError::Arity { actual: 1, .. })
        ));
        assert!(matches!(
            Modulus.calculate(&[Integer(10), Integer(3), Integer(1)]),
            Err(PluginError::Arity { actual: 3, .. })
        ));
        assert!(matches!(
            Modulus.calculate(&[Integer(10), Integer(0)]),
            Err(PluginError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_increment_shape_follows_argument_count() {
        assert_eq!(Increment.calculate(&[Integer(1)]).unwrap(), Integer(2));
        assert_eq!(
            Decrement.calculate(&[Integer(1), text("5")]).unwrap(),
            PluginValue::Sequence(vec![Integer(0), Integer(4)])
        );
        assert!(matches!(
            Increment.calculate(&[]),
            Err(PluginError::Arity { .. })
        ));
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(matches!(
            Add.calculate(&[Integer(i64::MAX), Integer(1)]),
            Err(PluginError::Evaluation { .. })
        ));
        assert!(Increment.calculate(&[Integer(i64::MAX)]).is_err());
        assert!(Multiply.calculate(&[Integer(i64::MAX), Integer(2)]).is_err());
    }
}
