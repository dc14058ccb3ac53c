//! Control-panel provider integrations
//!
//! Each supported vendor lives in its own module implementing the
//! [`traits::ControlPanel`] contract; [`factory`] resolves stored provider
//! records into adapter instances.

pub mod enhance;
pub mod factory;
pub mod traits;

pub use factory::ProviderFactory;
pub use traits::{
    ControlPanel, CustomerAccount, CustomerUpdate, DomainRecord, HostingAccount, HostingUpdate,
    NewCustomer, NewHosting, ProviderPlan,
};
