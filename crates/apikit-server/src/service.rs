//! Service contract and the route table services write into.
//!
//! A [`Service`] only attaches routes; it never brings infrastructure of its
//! own. Routes are keyed by method + path and the last registration for a key
//! wins, whether the earlier one came from a built-in route or another
//! service. The table is turned into an axum `Router` once, when the server
//! composes its stack.

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;

use apikit_core::error::{ApiKitError, Result};

/// A user-supplied unit of routes.
pub trait Service: Send + Sync {
    /// Name used in logs and route ownership.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Attach this service's routes. Called exactly once, at startup.
    fn register_routes(&self, routes: &mut Routes);
}

/// Owner recorded for routes the server installs itself.
pub const BUILTIN_OWNER: &str = "builtin";

struct RouteEntry {
    method: Method,
    path: String,
    owner: String,
    endpoint: MethodRouter,
}

/// Ordered method + path route table with last-registration-wins semantics.
pub struct Routes {
    entries: Vec<RouteEntry>,
    rejected: Vec<String>,
    owner: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self::new()
    }
}

impl Routes {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            rejected: Vec::new(),
            owner: BUILTIN_OWNER.to_string(),
        }
    }

    /// Attribute subsequent registrations to `owner`.
    pub(crate) fn set_owner(&mut self, owner: &str) {
        self.owner = owner.to_string();
    }

    /// Attach `handler` for `method` + `path`, replacing any previous entry for the same pair.
    pub fn route<H, T>(&mut self, method: Method, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route_with_state(method, path, handler, ())
    }

    /// Like [`Routes::route`] for handlers that extract `State<S>`.
    pub fn route_with_state<H, T, S>(&mut self, method: Method, path: &str, handler: H, state: S) -> &mut Self
    where
        H: Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        if !path.starts_with('/') {
            self.reject(format!("{method} {path}: path must start with '/'"));
            return self;
        }
        let filter = match MethodFilter::try_from(method.clone()) {
            Ok(f) => f,
            Err(_) => {
                self.reject(format!("{method} {path}: method not routable"));
                return self;
            }
        };
        let endpoint = on(filter, handler).with_state(state);
        self.insert(RouteEntry {
            method,
            path: path.to_string(),
            owner: self.owner.clone(),
            endpoint,
        });
        self
    }

    pub fn get<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::GET, path, handler)
    }

    pub fn post<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::POST, path, handler)
    }

    pub fn put<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::PUT, path, handler)
    }

    pub fn patch<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::PATCH, path, handler)
    }

    pub fn delete<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(Method::DELETE, path, handler)
    }

    fn reject(&mut self, reason: String) {
        tracing::error!(owner = %self.owner, %reason, "route rejected");
        self.rejected.push(reason);
    }

    fn insert(&mut self, entry: RouteEntry) {
        let existing = self
            .entries
            .iter_mut()
            .find(|e| e.method == entry.method && e.path == entry.path);
        match existing {
            Some(slot) => {
                tracing::warn!(
                    method = %entry.method,
                    path = %entry.path,
                    previous = %slot.owner,
                    owner = %entry.owner,
                    "route overridden, last registration wins"
                );
                *slot = entry;
            }
            None => {
                tracing::debug!(method = %entry.method, path = %entry.path, owner = %entry.owner, "route added");
                self.entries.push(entry);
            }
        }
    }

    /// `(method, path, owner)` in first-registration order.
    pub fn entries(&self) -> impl Iterator<Item = (&Method, &str, &str)> {
        self.entries
            .iter()
            .map(|e| (&e.method, e.path.as_str(), e.owner.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compose the table into a router. Fails if any registration was rejected
    /// or if two path templates conflict.
    pub(crate) fn into_router(self) -> Result<Router> {
        let Routes { entries, mut rejected, .. } = self;

        // One MethodRouter per path; keys are unique so merges never overlap.
        let mut by_path: Vec<(String, MethodRouter)> = Vec::new();
        for entry in entries {
            match by_path.iter_mut().find(|(p, _)| *p == entry.path) {
                Some((_, endpoint)) => {
                    let merged = std::mem::replace(endpoint, MethodRouter::new()).merge(entry.endpoint);
                    *endpoint = merged;
                }
                None => by_path.push((entry.path, entry.endpoint)),
            }
        }

        // axum panics on conflicting templates; check them against the same matcher first.
        let mut trial = matchit::Router::new();
        for (path, _) in &by_path {
            if let Err(e) = trial.insert(path.as_str(), ()) {
                tracing::error!(path = %path, error = %e, "route conflicts with an earlier template");
                rejected.push(format!("{path}: {e}"));
            }
        }

        if !rejected.is_empty() {
            return Err(ApiKitError::UnsupportedRoute(rejected.join("; ")));
        }

        Ok(by_path
            .into_iter()
            .fold(Router::new(), |router, (path, endpoint)| router.route(&path, endpoint)))
    }
}
