//! Portal auth core.
//!
//! - [`route`] classifies the current URL into a [`Route`].
//! - [`machine`] is the pure session/role state machine and [`controller`]
//!   drives it on tokio, publishing the selected [`View`].
//! - [`recovery`] exchanges a recovery link for a session and runs the new
//!   password form; [`login`] handles sign-in and reset requests.
//! - [`store`] is the contract of the identity backend all of the above use.

pub mod controller;
pub mod error;
pub mod history;
pub mod liveness;
pub mod login;
pub mod machine;
pub mod recovery;
pub mod route;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{ControllerHandle, ControllerSnapshot, spawn};
pub use error::AuthError;
pub use history::{History, MemoryHistory};
pub use liveness::Liveness;
pub use login::LoginFlow;
pub use machine::{AuthMachine, AuthState, Role, SessionEpoch};
pub use recovery::{RecoveryExchanger, RecoveryFlow, RecoveryStatus};
pub use route::{AdminRouteScheme, Navigation, RecoveryCredential, Route, RouteClassifier};
pub use store::{AuthEvent, Session, SessionChange, SessionStore, StoreError, Subscription};
pub use view::{View, ViewAction, select_view};
