use super::{
    machine::{AuthState, Role},
    route::Route,
};
use std::fmt;

/// The single top-level screen the portal shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    Recovery,
    Loading,
    Login,
    AccessDenied,
    Main { is_admin: bool },
}

/// Controls a view offers besides its forms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewAction {
    GoHome,
    SignOut,
}

impl View {
    #[must_use]
    pub const fn actions(self) -> &'static [ViewAction] {
        match self {
            Self::AccessDenied => &[ViewAction::GoHome, ViewAction::SignOut],
            Self::Main { .. } => &[ViewAction::SignOut],
            Self::Recovery | Self::Loading | Self::Login => &[],
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recovery => f.write_str("recovery"),
            Self::Loading => f.write_str("loading"),
            Self::Login => f.write_str("login"),
            Self::AccessDenied => f.write_str("access-denied"),
            Self::Main { is_admin: true } => f.write_str("main (admin)"),
            Self::Main { is_admin: false } => f.write_str("main"),
        }
    }
}

impl fmt::Display for ViewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoHome => f.write_str("go-home"),
            Self::SignOut => f.write_str("sign-out"),
        }
    }
}

/// Picks the view for `state` on `route`. Recovery wins even while loading;
/// nothing but the placeholder shows before the session read settles.
#[must_use]
pub fn select_view(state: &AuthState, route: Route) -> View {
    if route == Route::Recovery {
        return View::Recovery;
    }

    match state {
        AuthState::Initializing | AuthState::Terminated => View::Loading,
        AuthState::Unauthenticated => View::Login,
        AuthState::Authenticated { role, .. } => match (route, role) {
            (Route::Admin, Role::Unknown) => View::Loading,
            (Route::Admin, Role::NonAdmin) => View::AccessDenied,
            (_, role) => View::Main {
                is_admin: *role == Role::Admin,
            },
        },
    }
}
