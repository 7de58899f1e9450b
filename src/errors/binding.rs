use crate::{scope::BindingScope, service_id::ServiceId};

#[derive(thiserror::Error, Debug)]
pub enum BindingErrorKind {
    #[error("Binding for {service_id:?} is already configured")]
    AlreadyConfigured { service_id: ServiceId },
    #[error("Binding for {service_id:?} can't be bound to itself, the identifier isn't a class")]
    NotAClass { service_id: ServiceId },
    #[error("Binding for {service_id:?} is fixed to {scope} scope")]
    FixedScope { service_id: ServiceId, scope: BindingScope },
}
