// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The type vocabulary and the arena handles that types and trees refer to.

/// Size in bytes of one machine word. Ints and pointers occupy one word.
pub const WORD_SIZE: u32 = 4;

/// Handle to a [`Scope`](super::scope::Scope) in the module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Handle to a [`VarDecl`](super::scope::VarDecl) in the module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Handle to a [`FuncDecl`](super::scope::FuncDecl) in the module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub usize);

/// Handle to an [`AggregateDecl`](super::scope::AggregateDecl) in the module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AggregateId(pub usize);

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// 32-bit signed integer
    Int,
}

/// A resolved type.
///
/// Equality is structural for primitives, pointers and arrays. Aggregates
/// compare by declaration, so two classes with identical members are
/// still distinct types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// A primitive scalar
    Primitive(Primitive),
    /// Pointer to a base type
    Pointer(Box<Type>),
    /// Fixed-size array of an element type
    Array(Box<Type>, u32),
    /// A struct or class
    Aggregate(AggregateId),
}

impl Type {
    /// The `int` type.
    pub fn int() -> Self {
        Type::Primitive(Primitive::Int)
    }

    /// A pointer to `base`.
    pub fn pointer_to(base: Type) -> Self {
        Type::Pointer(Box::new(base))
    }

    /// An array of `count` elements of type `element`.
    pub fn array_of(element: Type, count: u32) -> Self {
        Type::Array(Box::new(element), count)
    }

    /// Returns true for `int`.
    pub fn is_int(&self) -> bool {
        matches!(self, Type::Primitive(Primitive::Int))
    }

    /// Returns true for pointer types.
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Returns true for values that fit in a single word.
    pub fn is_word(&self) -> bool {
        matches!(self, Type::Primitive(_) | Type::Pointer(_))
    }

    /// The pointee of a pointer type.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(base) => Some(base),
            _ => None,
        }
    }

    /// The element type produced by indexing, for arrays and pointers.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(element, _) | Type::Pointer(element) => Some(element),
            _ => None,
        }
    }

    /// The aggregate this type names directly.
    pub fn aggregate(&self) -> Option<AggregateId> {
        match self {
            Type::Aggregate(id) => Some(*id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_reflexive() {
        let types = [
            Type::int(),
            Type::pointer_to(Type::int()),
            Type::array_of(Type::int(), 3),
            Type::Aggregate(AggregateId(0)),
        ];
        for ty in &types {
            assert_eq!(ty, &ty.clone());
        }
    }

    #[test]
    fn test_equality_is_symmetric() {
        let a = Type::pointer_to(Type::array_of(Type::int(), 2));
        let b = Type::pointer_to(Type::array_of(Type::int(), 2));
        let c = Type::pointer_to(Type::array_of(Type::int(), 3));
        assert!(a == b && b == a);
        assert!(a != c && c != a);
    }

    #[test]
    fn test_aggregates_compare_by_declaration() {
        assert_ne!(
            Type::Aggregate(AggregateId(0)),
            Type::Aggregate(AggregateId(1))
        );
        assert_ne!(
            Type::pointer_to(Type::Aggregate(AggregateId(0))),
            Type::pointer_to(Type::Aggregate(AggregateId(1)))
        );
    }

    #[test]
    fn test_element_and_pointee() {
        let array = Type::array_of(Type::int(), 4);
        assert_eq!(array.element(), Some(&Type::int()));
        assert_eq!(array.pointee(), None);
        let ptr = Type::pointer_to(Type::int());
        assert_eq!(ptr.element(), Some(&Type::int()));
        assert!(ptr.is_word());
        assert!(!array.is_word());
    }
}
