//! Route table and the one authoritative session guard.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    Signup,
    Chats,
    Dashboard,
    Contacts,
    Analytics,
    Files,
    Calls,
    Archive,
    Settings,
    Other(String),
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Root,
            "/login" => Route::Login,
            "/login/signup" => Route::Signup,
            "/chats" => Route::Chats,
            "/dashboard" => Route::Dashboard,
            "/contacts" => Route::Contacts,
            "/analytics" => Route::Analytics,
            "/files" => Route::Files,
            "/calls" => Route::Calls,
            "/archive" => Route::Archive,
            "/settings" => Route::Settings,
            other => Route::Other(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Root => "/",
            Route::Login => "/login",
            Route::Signup => "/login/signup",
            Route::Chats => "/chats",
            Route::Dashboard => "/dashboard",
            Route::Contacts => "/contacts",
            Route::Analytics => "/analytics",
            Route::Files => "/files",
            Route::Calls => "/calls",
            Route::Archive => "/archive",
            Route::Settings => "/settings",
            Route::Other(p) => p,
        }
    }

    /// Everything under `/login` is reachable without a session.
    pub fn is_public(&self) -> bool {
        let p = self.path();
        // Segment match: `/loginfoo` is not a login page, unlike a bare prefix check.
        p == "/login" || p.starts_with("/login/")
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn from_session<T>(session: Option<&T>) -> Self {
        if session.is_some() { AuthState::Authenticated } else { AuthState::Unauthenticated }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    Allow,
    Redirect(Route),
}

pub fn guard(target: &Route, auth: AuthState) -> Guard {
    match (auth, target) {
        (AuthState::Authenticated, Route::Root) => Guard::Redirect(Route::Chats),
        (AuthState::Unauthenticated, Route::Root) => Guard::Redirect(Route::Login),
        (AuthState::Authenticated, t) if t.is_public() => Guard::Redirect(Route::Chats),
        (AuthState::Unauthenticated, t) if !t.is_public() => Guard::Redirect(Route::Login),
        _ => Guard::Allow,
    }
}

/// Tracks the current route and re-runs [`guard`] on navigation and on session changes.
/// The startup pass uses the persisted session optimistically; the pass that follows
/// session validation uses the same function, so the two cannot disagree.
#[derive(Debug, Clone)]
pub struct Router {
    current: Route,
    auth: AuthState,
}

impl Router {
    pub fn new(auth: AuthState) -> Self {
        let mut router = Self { current: Route::Root, auth };
        router.navigate("/");
        router
    }

    pub fn current(&self) -> &Route {
        &self.current
    }

    pub fn auth(&self) -> AuthState {
        self.auth
    }

    /// Resolves `path` against the guard and returns where the user actually lands.
    pub fn navigate(&mut self, path: &str) -> &Route {
        let mut target = Route::parse(path);
        while let Guard::Redirect(next) = guard(&target, self.auth) {
            log::debug!("redirect {} -> {}", target, next);
            target = next;
        }
        self.current = target;
        &self.current
    }

    /// Re-evaluates the current route for a new auth state. Returns the new route if it moved.
    pub fn set_auth(&mut self, auth: AuthState) -> Option<&Route> {
        self.auth = auth;
        let before = self.current.clone();
        self.navigate(&before.path().to_string());
        if self.current != before { Some(&self.current) } else { None }
    }
}
