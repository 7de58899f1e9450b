use crate::{errors::ConfigErrorKind, scope::BindingScope};

/// Options a container is constructed with
/// ## Fields
/// - `default_scope`:
///   Scope given to every binding that doesn't choose one explicitly.
///
/// - `auto_bind_on_miss`:
///   If `true`, a class identifier that is bound nowhere in the container chain is bound to itself
///   in the requesting container the first time it is requested.
///
/// - `skip_base_class_checks`:
///   Accepted for configuration compatibility. There is no implementation inheritance to check,
///   so the flag has no effect on planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    pub default_scope: BindingScope,
    pub auto_bind_on_miss: bool,
    pub skip_base_class_checks: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            default_scope: BindingScope::Transient,
            auto_bind_on_miss: false,
            skip_base_class_checks: false,
        }
    }
}

impl ContainerOptions {
    #[inline]
    #[must_use]
    pub fn with_default_scope(mut self, scope: BindingScope) -> Self {
        self.default_scope = scope;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_auto_bind_on_miss(mut self, value: bool) -> Self {
        self.auto_bind_on_miss = value;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_skip_base_class_checks(mut self, value: bool) -> Self {
        self.skip_base_class_checks = value;
        self
    }

    /// Parses options from string key/value pairs, e.g. read from a configuration file or environment.
    /// Keys that aren't present keep their default value.
    ///
    /// # Errors
    /// - Returns [`ConfigErrorKind::UnknownOption`] for an unknown key
    /// - Returns [`ConfigErrorKind::InvalidScope`] if `default_scope` isn't one of `singleton`, `transient`, `request`
    /// - Returns [`ConfigErrorKind::InvalidFlag`] if a flag isn't `true` or `false`
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigErrorKind>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            match key.trim() {
                "default_scope" => options.default_scope = value.parse()?,
                "auto_bind_on_miss" => options.auto_bind_on_miss = parse_flag("auto_bind_on_miss", value)?,
                "skip_base_class_checks" => options.skip_base_class_checks = parse_flag("skip_base_class_checks", value)?,
                other => return Err(ConfigErrorKind::UnknownOption { option: other.to_owned() }),
            }
        }
        Ok(options)
    }
}

fn parse_flag(option: &'static str, value: &str) -> Result<bool, ConfigErrorKind> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigErrorKind::InvalidFlag {
            option,
            value: value.to_owned(),
        }),
    }
}
