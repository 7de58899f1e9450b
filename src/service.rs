mod base;
mod boxed_clone;
mod service_fn;

pub use base::Service;
pub use boxed_clone::BoxCloneService;
pub use service_fn::{service_fn, ServiceFn};
