//! Typed arrays with per-element known bits (spec §3.1/§3.2).

use crate::value::{Value, ValueType};
use std::fmt::{self, Display, Formatter};

/// One array variant per scalar element type. Capacity is fixed at
/// construction; `size` is the live length, which for declared array
/// variables may grow up to an independently-tracked `MaxSize` (spec
/// §4.3) that is enforced by the owning [crate::variable::ArrayVariable],
/// not by this type.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValue {
    Boolean(TypedArray<bool>),
    Integer(TypedArray<i32>),
    Real(TypedArray<f64>),
    String(TypedArray<String>),
}

/// A fixed-capacity vector of optional values: `None` means the slot's
/// known bit is false.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedArray<T> {
    elements: Vec<Option<T>>,
}

impl<T: Clone> TypedArray<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.elements.len()
    }

    pub fn get(&self, index: usize) -> Option<Option<&T>> {
        self.elements.get(index).map(|slot| slot.as_ref())
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<(), ArrayBoundsError> {
        let slot = self
            .elements
            .get_mut(index)
            .ok_or(ArrayBoundsError { index, capacity: self.elements.len() })?;
        *slot = Some(value);
        Ok(())
    }

    pub fn set_unknown(&mut self, index: usize) -> Result<(), ArrayBoundsError> {
        let slot = self
            .elements
            .get_mut(index)
            .ok_or(ArrayBoundsError { index, capacity: self.elements.len() })?;
        *slot = None;
        Ok(())
    }

    pub fn all_known(&self) -> bool {
        self.elements.iter().all(|e| e.is_some())
    }

    pub fn any_known(&self) -> bool {
        self.elements.iter().any(|e| e.is_some())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("array index {index} out of bounds (capacity {capacity})")]
pub struct ArrayBoundsError {
    pub index: usize,
    pub capacity: usize,
}

impl ArrayValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            ArrayValue::Boolean(_) => ValueType::BooleanArray,
            ArrayValue::Integer(_) => ValueType::IntegerArray,
            ArrayValue::Real(_) => ValueType::RealArray,
            ArrayValue::String(_) => ValueType::StringArray,
        }
    }

    pub fn element_type(&self) -> ValueType {
        self.value_type().array_element_type().unwrap()
    }

    pub fn with_capacity(element_type: ValueType, capacity: usize) -> Option<Self> {
        Some(match element_type {
            ValueType::Boolean => ArrayValue::Boolean(TypedArray::with_capacity(capacity)),
            ValueType::Integer => ArrayValue::Integer(TypedArray::with_capacity(capacity)),
            ValueType::Real => ArrayValue::Real(TypedArray::with_capacity(capacity)),
            ValueType::String => ArrayValue::String(TypedArray::with_capacity(capacity)),
            _ => return None,
        })
    }

    pub fn capacity(&self) -> usize {
        match self {
            ArrayValue::Boolean(a) => a.capacity(),
            ArrayValue::Integer(a) => a.capacity(),
            ArrayValue::Real(a) => a.capacity(),
            ArrayValue::String(a) => a.capacity(),
        }
    }

    /// Current runtime length. In this crate arrays do not shrink or
    /// grow in place beyond their constructed capacity (spec §4.3: the
    /// `MaxSize` expression bounds growth, but the backing storage is
    /// allocated at that bound up front; `size()` and `capacity()`
    /// therefore coincide).
    pub fn size(&self) -> usize {
        self.capacity()
    }

    pub fn element_known(&self, index: usize) -> Option<bool> {
        match self {
            ArrayValue::Boolean(a) => a.get(index).map(|v| v.is_some()),
            ArrayValue::Integer(a) => a.get(index).map(|v| v.is_some()),
            ArrayValue::Real(a) => a.get(index).map(|v| v.is_some()),
            ArrayValue::String(a) => a.get(index).map(|v| v.is_some()),
        }
    }

    pub fn get_element(&self, index: usize) -> Option<Option<Value>> {
        match self {
            ArrayValue::Boolean(a) => a.get(index).map(|v| v.map(|b| Value::Boolean(*b))),
            ArrayValue::Integer(a) => a.get(index).map(|v| v.map(|i| Value::Integer(*i))),
            ArrayValue::Real(a) => a.get(index).map(|v| v.map(|r| Value::Real(*r))),
            ArrayValue::String(a) => a.get(index).map(|v| v.map(|s| Value::String(s.clone()))),
        }
    }

    pub fn set_element(&mut self, index: usize, value: Value) -> Result<(), ArrayBoundsError> {
        match (self, value) {
            (ArrayValue::Boolean(a), Value::Boolean(b)) => a.set(index, b),
            (ArrayValue::Integer(a), Value::Integer(i)) => a.set(index, i),
            (ArrayValue::Real(a), Value::Real(r)) => a.set(index, r),
            (ArrayValue::Real(a), Value::Integer(i)) => a.set(index, i as f64),
            (ArrayValue::String(a), Value::String(s)) => a.set(index, s),
            (this, _) => Err(ArrayBoundsError { index, capacity: this.capacity() }),
        }
    }

    pub fn set_element_unknown(&mut self, index: usize) -> Result<(), ArrayBoundsError> {
        match self {
            ArrayValue::Boolean(a) => a.set_unknown(index),
            ArrayValue::Integer(a) => a.set_unknown(index),
            ArrayValue::Real(a) => a.set_unknown(index),
            ArrayValue::String(a) => a.set_unknown(index),
        }
    }

    pub fn all_known(&self) -> bool {
        match self {
            ArrayValue::Boolean(a) => a.all_known(),
            ArrayValue::Integer(a) => a.all_known(),
            ArrayValue::Real(a) => a.all_known(),
            ArrayValue::String(a) => a.all_known(),
        }
    }

    pub fn any_known(&self) -> bool {
        match self {
            ArrayValue::Boolean(a) => a.any_known(),
            ArrayValue::Integer(a) => a.any_known(),
            ArrayValue::Real(a) => a.any_known(),
            ArrayValue::String(a) => a.any_known(),
        }
    }
}

impl Display for ArrayValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#(")?;
        for i in 0..self.size() {
            if i > 0 {
                write!(f, " ")?;
            }
            match self.get_element(i).flatten() {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "UNKNOWN")?,
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_array_is_all_unknown() {
        let a = ArrayValue::with_capacity(ValueType::Integer, 8).unwrap();
        assert_eq!(a.size(), 8);
        assert!(!a.all_known());
        assert!(!a.any_known());
    }

    #[test]
    fn all_known_and_any_known_track_element_writes() {
        let mut a = ArrayValue::with_capacity(ValueType::Integer, 2).unwrap();
        assert!(!a.any_known());
        a.set_element(0, Value::Integer(1)).unwrap();
        assert!(a.any_known());
        assert!(!a.all_known());
        a.set_element(1, Value::Integer(2)).unwrap();
        assert!(a.all_known());
    }

    #[test]
    fn out_of_bounds_set_errors() {
        let mut a = ArrayValue::with_capacity(ValueType::Boolean, 1).unwrap();
        assert!(a.set_element(5, Value::Boolean(true)).is_err());
    }

    #[test]
    fn display_shows_unknown_elements() {
        let mut a = ArrayValue::with_capacity(ValueType::Integer, 2).unwrap();
        a.set_element(0, Value::Integer(7)).unwrap();
        assert_eq!(a.to_string(), "#(7 UNKNOWN)");
    }
}
