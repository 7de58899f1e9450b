use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::errors::ConfigErrorKind;

/// Lifetime of a binding's resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum BindingScope {
    /// One shared instance per container, kept until the binding is removed
    Singleton,
    /// A fresh instance for every resolution
    #[default]
    Transient,
    /// One instance shared within a single top-level resolution
    Request,
}

impl BindingScope {
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            BindingScope::Singleton => "singleton",
            BindingScope::Transient => "transient",
            BindingScope::Request => "request",
        }
    }
}

impl Display for BindingScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BindingScope {
    type Err = ConfigErrorKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "singleton" => Ok(BindingScope::Singleton),
            "transient" => Ok(BindingScope::Transient),
            "request" => Ok(BindingScope::Request),
            _ => Err(ConfigErrorKind::InvalidScope { value: value.to_owned() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BindingScope::{self, *};
    use crate::errors::ConfigErrorKind;

    #[test]
    fn test_parse() {
        assert_eq!("singleton".parse::<BindingScope>().unwrap(), Singleton);
        assert_eq!(" Transient ".parse::<BindingScope>().unwrap(), Transient);
        assert_eq!("REQUEST".parse::<BindingScope>().unwrap(), Request);
        assert!(matches!(
            "session".parse::<BindingScope>(),
            Err(ConfigErrorKind::InvalidScope { value }) if value == "session"
        ));
    }

    #[test]
    fn test_default_is_transient() {
        assert_eq!(BindingScope::default(), Transient);
    }
}
