use std::{
    borrow::Cow,
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    sync::Arc,
};

use crate::{
    any::TypeInfo,
    instantiator::{Class, Injectable},
    utils::id::next_id,
};

/// Metadata key used by named bindings and named requests.
pub const NAMED_TAG: &str = "named";

/// Opaque token naming a requested capability.
///
/// Identifiers are only ever compared. [`ServiceId::Type`] and [`ServiceId::Class`] of the same type are equal,
/// the class variant only additionally knows how to construct the type.
#[derive(Clone)]
pub enum ServiceId {
    Type(TypeInfo),
    Class(Class),
    Name(Cow<'static, str>),
    Symbol(Symbol),
}

impl ServiceId {
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeInfo::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn class<T: Injectable>() -> Self {
        Self::Class(Class::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn name(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Name(name.into())
    }

    /// Returns the class this identifier was made from, if any
    #[inline]
    #[must_use]
    pub fn as_class(&self) -> Option<&Class> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Type(_) | Self::Class(_) => 0,
            Self::Name(_) => 1,
            Self::Symbol(_) => 2,
        }
    }

    fn type_info(&self) -> Option<&TypeInfo> {
        match self {
            Self::Type(type_info) => Some(type_info),
            Self::Class(class) => Some(class.type_info()),
            _ => None,
        }
    }
}

impl PartialEq for ServiceId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ServiceId {}

impl PartialOrd for ServiceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Name(left), Self::Name(right)) => left.cmp(right),
            (Self::Symbol(left), Self::Symbol(right)) => left.cmp(right),
            _ => match (self.type_info(), other.type_info()) {
                (Some(left), Some(right)) => left.cmp(right),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl Display for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(type_info) => Display::fmt(type_info, f),
            Self::Class(class) => Display::fmt(class.type_info(), f),
            Self::Name(name) => f.write_str(name),
            Self::Symbol(symbol) => Display::fmt(symbol, f),
        }
    }
}

impl Debug for ServiceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(type_info) => write!(f, "Type({})", type_info.name),
            Self::Class(class) => write!(f, "Class({})", class.type_info().name),
            Self::Name(name) => write!(f, "Name({name:?})"),
            Self::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

impl From<&'static str> for ServiceId {
    fn from(name: &'static str) -> Self {
        Self::Name(Cow::Borrowed(name))
    }
}

impl From<String> for ServiceId {
    fn from(name: String) -> Self {
        Self::Name(Cow::Owned(name))
    }
}

impl From<Symbol> for ServiceId {
    fn from(symbol: Symbol) -> Self {
        Self::Symbol(symbol)
    }
}

impl From<&Symbol> for ServiceId {
    fn from(symbol: &Symbol) -> Self {
        Self::Symbol(symbol.clone())
    }
}

impl From<Class> for ServiceId {
    fn from(class: Class) -> Self {
        Self::Class(class)
    }
}

impl From<&ServiceId> for ServiceId {
    fn from(service_id: &ServiceId) -> Self {
        service_id.clone()
    }
}

/// Unique identifier token. Two symbols are equal only if one is a clone of the other,
/// the description is for diagnostics.
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    #[must_use]
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        Self {
            id: next_id(),
            description: description.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Key/value metadata attached to a dependency or a top-level request and matched by binding constraints
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    pub key: Cow<'static, str>,
    pub value: Cow<'static, str>,
}

impl Tag {
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(NAMED_TAG, name)
    }

    #[inline]
    #[must_use]
    pub fn is_named(&self) -> bool {
        self.key == NAMED_TAG
    }
}
