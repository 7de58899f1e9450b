use crate::{container::Container, service_id::ServiceId};

/// Resolution context handed to computed values, factories, providers and activation hooks
#[derive(Clone)]
pub struct Context {
    /// Container the top-level request was made against
    pub container: Container,
    /// Identifier being resolved
    pub service_id: ServiceId,
    /// Identifier of the dependent, `None` for a top-level request
    pub parent: Option<ServiceId>,
}
