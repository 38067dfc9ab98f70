//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, construct a new one. Constructors are the only place where
/// validation happens, so holding a value object means holding a valid value.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
