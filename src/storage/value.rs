//! Stored Value Model
//!
//! Every value in the cache is one [`Value`]: a tagged union over a closed set
//! of types. Keeping the set closed means each value carries its own tag when
//! serialized, so snapshots need no global type registry.
//!
//! ```text
//! Value
//!   ├── Scalar(Scalar)        string | bool | i8..i64 | u8..u64 | f32 | f64
//!   ├── Sequence(Sequence)    Vec<scalar>             (homogeneous)
//!   └── Mapping(Mapping)      HashMap<String, scalar> (homogeneous)
//! ```
//!
//! The typed accessors never inspect the enums directly. They go through
//! [`CacheValue`] (any storable Rust type) and [`ScalarValue`] (element types),
//! which are implemented for each supported type by the macro below.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A Rust type that can be stored in and read back from the cache.
///
/// Implemented for every [`ScalarValue`] type `T`, for `Vec<T>` and for
/// `HashMap<String, T>`.
pub trait CacheValue: Sized {
    /// The kind a value of this type is stored as.
    fn kind() -> ValueKind;

    /// Wraps `self` into the untyped representation.
    fn into_value(self) -> Value;

    /// Returns a copy of the stored value if it has exactly this type.
    fn from_value_ref(value: &Value) -> Option<Self>;
}

/// An element type: storable on its own, in a sequence, or in a map.
pub trait ScalarValue: CacheValue + Clone {
    /// Tag of this element type.
    const KIND: ScalarKind;

    /// Borrows the value mutably if it is a scalar of this type.
    fn scalar_mut(value: &mut Value) -> Option<&mut Self>;

    /// Borrows the value mutably if it is a sequence of this type.
    fn sequence_mut(value: &mut Value) -> Option<&mut Vec<Self>>;

    /// Borrows the value mutably if it is a string-keyed map of this type.
    fn mapping_mut(value: &mut Value) -> Option<&mut HashMap<String, Self>>;
}

/// Element types that support increment and decrement.
///
/// Integer arithmetic is checked; floats follow IEEE 754 and never fail.
pub trait Numeric: ScalarValue + Copy {
    /// `self + rhs`, or `None` on overflow.
    fn try_add(self, rhs: Self) -> Option<Self>;

    /// `self - rhs`, or `None` on overflow.
    fn try_sub(self, rhs: Self) -> Option<Self>;
}

macro_rules! storable_types {
    ($($variant:ident($ty:ty) => $name:literal),* $(,)?) => {
        /// Tag identifying an element type.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum ScalarKind {
            $($variant,)*
        }

        impl ScalarKind {
            /// Human-readable type name.
            pub fn name(self) -> &'static str {
                match self {
                    $(ScalarKind::$variant => $name,)*
                }
            }
        }

        /// A single element.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Scalar {
            $($variant($ty),)*
        }

        /// A homogeneous sequence of elements.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Sequence {
            $($variant(Vec<$ty>),)*
        }

        /// A homogeneous map from string to element.
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub enum Mapping {
            $($variant(HashMap<String, $ty>),)*
        }

        impl Scalar {
            pub fn kind(&self) -> ScalarKind {
                match self {
                    $(Scalar::$variant(_) => ScalarKind::$variant,)*
                }
            }
        }

        impl Sequence {
            /// Element type of the sequence.
            pub fn kind(&self) -> ScalarKind {
                match self {
                    $(Sequence::$variant(_) => ScalarKind::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(Sequence::$variant(items) => items.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        impl Mapping {
            /// Element type of the map values.
            pub fn kind(&self) -> ScalarKind {
                match self {
                    $(Mapping::$variant(_) => ScalarKind::$variant,)*
                }
            }

            pub fn len(&self) -> usize {
                match self {
                    $(Mapping::$variant(fields) => fields.len(),)*
                }
            }

            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }
        }

        $(
            impl ScalarValue for $ty {
                const KIND: ScalarKind = ScalarKind::$variant;

                fn scalar_mut(value: &mut Value) -> Option<&mut Self> {
                    match value {
                        Value::Scalar(Scalar::$variant(v)) => Some(v),
                        _ => None,
                    }
                }

                fn sequence_mut(value: &mut Value) -> Option<&mut Vec<Self>> {
                    match value {
                        Value::Sequence(Sequence::$variant(items)) => Some(items),
                        _ => None,
                    }
                }

                fn mapping_mut(value: &mut Value) -> Option<&mut HashMap<String, Self>> {
                    match value {
                        Value::Mapping(Mapping::$variant(fields)) => Some(fields),
                        _ => None,
                    }
                }
            }

            impl CacheValue for $ty {
                fn kind() -> ValueKind {
                    ValueKind::Scalar(ScalarKind::$variant)
                }

                fn into_value(self) -> Value {
                    Value::Scalar(Scalar::$variant(self))
                }

                fn from_value_ref(value: &Value) -> Option<Self> {
                    match value {
                        Value::Scalar(Scalar::$variant(v)) => Some(Clone::clone(v)),
                        _ => None,
                    }
                }
            }

            impl CacheValue for Vec<$ty> {
                fn kind() -> ValueKind {
                    ValueKind::Sequence(ScalarKind::$variant)
                }

                fn into_value(self) -> Value {
                    Value::Sequence(Sequence::$variant(self))
                }

                fn from_value_ref(value: &Value) -> Option<Self> {
                    match value {
                        Value::Sequence(Sequence::$variant(items)) => Some(items.clone()),
                        _ => None,
                    }
                }
            }

            impl CacheValue for HashMap<String, $ty> {
                fn kind() -> ValueKind {
                    ValueKind::Mapping(ScalarKind::$variant)
                }

                fn into_value(self) -> Value {
                    Value::Mapping(Mapping::$variant(self))
                }

                fn from_value_ref(value: &Value) -> Option<Self> {
                    match value {
                        Value::Mapping(Mapping::$variant(fields)) => Some(fields.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

storable_types! {
    Str(String) => "string",
    Bool(bool) => "bool",
    I8(i8) => "i8",
    I16(i16) => "i16",
    I32(i32) => "i32",
    I64(i64) => "i64",
    U8(u8) => "u8",
    U16(u16) => "u16",
    U32(u32) => "u32",
    U64(u64) => "u64",
    F32(f32) => "f32",
    F64(f64) => "f64",
}

macro_rules! integer_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn try_add(self, rhs: Self) -> Option<Self> {
                    self.checked_add(rhs)
                }

                #[inline]
                fn try_sub(self, rhs: Self) -> Option<Self> {
                    self.checked_sub(rhs)
                }
            }
        )*
    };
}

macro_rules! float_numeric {
    ($($ty:ty),*) => {
        $(
            impl Numeric for $ty {
                #[inline]
                fn try_add(self, rhs: Self) -> Option<Self> {
                    Some(self + rhs)
                }

                #[inline]
                fn try_sub(self, rhs: Self) -> Option<Self> {
                    Some(self - rhs)
                }
            }
        )*
    };
}

integer_numeric!(i8, i16, i32, i64, u8, u16, u32, u64);
float_numeric!(f32, f64);

/// An untyped cache value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(Scalar),
    Sequence(Sequence),
    Mapping(Mapping),
}

impl Value {
    /// Wraps a typed value.
    pub fn from_typed<T: CacheValue>(value: T) -> Self {
        value.into_value()
    }

    /// Returns the runtime type of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(s) => ValueKind::Scalar(s.kind()),
            Value::Sequence(s) => ValueKind::Sequence(s.kind()),
            Value::Mapping(m) => ValueKind::Mapping(m.kind()),
        }
    }
}

/// Runtime type of a [`Value`], used in type mismatch errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Scalar(ScalarKind),
    Sequence(ScalarKind),
    Mapping(ScalarKind),
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Scalar(k) => write!(f, "{}", k),
            ValueKind::Sequence(k) => write!(f, "[{}]", k),
            ValueKind::Mapping(k) => write!(f, "{{string: {}}}", k),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_of_each_shape() {
        assert_eq!(
            Value::from_typed(7i64).kind(),
            ValueKind::Scalar(ScalarKind::I64)
        );
        assert_eq!(
            Value::from_typed(vec![1.5f32]).kind(),
            ValueKind::Sequence(ScalarKind::F32)
        );

        let mut fields = HashMap::new();
        fields.insert("a".to_string(), true);
        assert_eq!(
            Value::from_typed(fields).kind(),
            ValueKind::Mapping(ScalarKind::Bool)
        );
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ValueKind::Scalar(ScalarKind::Str).to_string(), "string");
        assert_eq!(ValueKind::Sequence(ScalarKind::U8).to_string(), "[u8]");
        assert_eq!(
            ValueKind::Mapping(ScalarKind::I32).to_string(),
            "{string: i32}"
        );
    }

    #[test]
    fn test_from_value_ref_requires_exact_type() {
        let value = Value::from_typed(5i32);

        assert_eq!(i32::from_value_ref(&value), Some(5));
        assert_eq!(i64::from_value_ref(&value), None);
        assert_eq!(<Vec<i32>>::from_value_ref(&value), None);
        assert_eq!(String::from_value_ref(&value), None);
    }

    #[test]
    fn test_mutable_views() {
        let mut value = Value::from_typed(vec!["a".to_string()]);

        assert!(String::scalar_mut(&mut value).is_none());
        assert!(String::mapping_mut(&mut value).is_none());
        String::sequence_mut(&mut value)
            .expect("sequence of strings")
            .push("b".to_string());

        match &value {
            Value::Sequence(seq) => assert_eq!(seq.len(), 2),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_integer_arithmetic_is_checked() {
        assert_eq!(i8::MAX.try_add(1), None);
        assert_eq!(0u32.try_sub(1), None);
        assert_eq!(40i64.try_add(2), Some(42));
        assert_eq!(1.5f64.try_sub(0.5), Some(1.0));
    }
}
