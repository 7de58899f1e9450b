#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigErrorKind {
    #[error("Unknown container option `{option}`")]
    UnknownOption { option: String },
    #[error("Invalid scope `{value}`, expected one of `singleton`, `transient`, `request`")]
    InvalidScope { value: String },
    #[error("Invalid value `{value}` for flag `{option}`, expected `true` or `false`")]
    InvalidFlag { option: &'static str, value: String },
}
