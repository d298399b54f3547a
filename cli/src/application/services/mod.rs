//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod awg_manager;
pub mod locks;
pub mod provision;
pub mod session;
pub mod transfer;
pub mod xray_manager;

pub use awg_manager::AwgManager;
pub use locks::SessionLocks;
pub use provision::{
    ClientSummary, ExistingPeer, IssuedCredential, Provisioner, ProvisionerOptions,
};
pub use session::{ConfigSession, SessionOptions};
pub use xray_manager::XrayManager;
