mod policy;
mod entitlement;
mod request;

pub use policy::*;
pub use entitlement::*;
pub use request::*;
