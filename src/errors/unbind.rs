use std::fmt::{self, Display, Formatter};

use super::InstantiateErrorKind;
use crate::service_id::ServiceId;

/// Failure of a deactivation or destructor hook for one identifier
#[derive(thiserror::Error, Debug)]
#[error("Deactivation of {service_id:?} failed: {source}")]
pub struct DeactivateError {
    pub service_id: ServiceId,
    pub source: InstantiateErrorKind,
}

#[derive(thiserror::Error, Debug)]
pub enum UnbindErrorKind {
    #[error("Can't unbind {service_id:?}, no bindings found")]
    NoBinding { service_id: ServiceId },
    #[error("Can't deactivate {service_id:?} synchronously, its value or hooks are pending. Use the async variant")]
    LazySync { service_id: ServiceId },
    #[error("{}", DeactivateErrors(.0))]
    Deactivation(Vec<DeactivateError>),
}

struct DeactivateErrors<'a>(&'a [DeactivateError]);

impl Display for DeactivateErrors<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} deactivation(s) failed", self.0.len())?;
        for err in self.0 {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}
