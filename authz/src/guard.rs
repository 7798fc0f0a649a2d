//! Route guard: decides whether a requested view may render.
//!
//! The guard starts `Unresolved` and answers `Pending` until a snapshot's
//! allowed prefixes arrive. Each newer snapshot replaces the previous one
//! outright. Decisions are recomputed on every call and never cached.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AuthzError, Result};
use crate::paths::AllowedPaths;
use crate::snapshot::Generation;

/// Performs the redirect a guard decision asks for.
pub trait Navigator {
    fn redirect(&self, path: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GuardState {
    /// No menu or authorization snapshot has loaded yet.
    #[default]
    Unresolved,
    Resolved {
        generation: Generation,
        allowed: AllowedPaths,
    },
}

/// What the guard wants done with a requested route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum GuardDecision {
    /// Still waiting for a snapshot.
    Pending,
    /// Render the route. `active` is the menu entry to highlight.
    Allow { active: Option<String> },
    /// Navigate to the first allowed prefix in menu order.
    Redirect { to: String },
    /// The principal has no usable menu. Show an empty state, do not navigate.
    Empty,
}

/// True when some allowed prefix covers `path`.
pub fn is_route_allowed(path: &str, allowed: &AllowedPaths) -> bool {
    allowed.covers(path)
}

#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    state: GuardState,
}

impl RouteGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, GuardState::Resolved { .. })
    }

    /// Installs the allowed prefixes of a freshly loaded snapshot.
    ///
    /// A snapshot older than the one already installed is rejected with
    /// [`AuthzError::StaleSnapshotDiscarded`] and the current state is kept.
    pub fn resolve(&mut self, generation: Generation, allowed: AllowedPaths) -> Result<()> {
        if let GuardState::Resolved {
            generation: current,
            ..
        } = &self.state
        {
            if generation < *current {
                debug!(
                    generation = generation.get(),
                    latest = current.get(),
                    "route guard ignoring stale snapshot"
                );
                return Err(AuthzError::StaleSnapshotDiscarded {
                    generation: generation.get(),
                    latest: current.get(),
                });
            }
        }
        debug!(generation = generation.get(), prefixes = allowed.len(), "route guard resolved");
        self.state = GuardState::Resolved {
            generation,
            allowed,
        };
        Ok(())
    }

    /// Back to `Unresolved`, e.g. on sign-out.
    pub fn reset(&mut self) {
        self.state = GuardState::Unresolved;
    }

    pub fn decide(&self, route: &str) -> GuardDecision {
        let GuardState::Resolved { allowed, .. } = &self.state else {
            return GuardDecision::Pending;
        };
        if let Some(active) = allowed.longest_match(route) {
            return GuardDecision::Allow {
                active: Some(active.to_string()),
            };
        }
        match allowed.first() {
            Some(first) => GuardDecision::Redirect {
                to: first.to_string(),
            },
            None => GuardDecision::Empty,
        }
    }

    /// Decides and, when needed, redirects through `navigator`.
    ///
    /// The redirect target is itself an allowed prefix, so following it always
    /// ends in `Allow`. An empty allowed set never navigates.
    pub fn enforce(&self, route: &str, navigator: &dyn Navigator) -> GuardDecision {
        let decision = self.decide(route);
        match &decision {
            GuardDecision::Redirect { to } => {
                info!("Route {} not permitted, redirecting to {}", route, to);
                navigator.redirect(to);
            }
            GuardDecision::Empty => {
                info!("No permitted menu entries, showing empty state for {}", route);
            }
            GuardDecision::Pending | GuardDecision::Allow { .. } => {}
        }
        decision
    }

    /// Installs a new snapshot and re-evaluates the current route against it.
    pub fn on_snapshot(
        &mut self,
        generation: Generation,
        allowed: AllowedPaths,
        current_route: &str,
        navigator: &dyn Navigator,
    ) -> Result<GuardDecision> {
        self.resolve(generation, allowed)?;
        Ok(self.enforce(current_route, navigator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotSequencer;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingNavigator {
        visited: RefCell<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, path: &str) {
            self.visited.borrow_mut().push(path.to_string());
        }
    }

    fn allowed() -> AllowedPaths {
        AllowedPaths::from_prefixes(["/users", "/roles", "/users/detail"])
    }

    #[test]
    fn test_is_route_allowed() {
        let allowed = AllowedPaths::from_prefixes(["/users"]);
        assert!(is_route_allowed("/users/42", &allowed));
        assert!(!is_route_allowed("/roles", &allowed));
        assert!(!is_route_allowed("/anything", &AllowedPaths::default()));
    }

    #[test]
    fn test_unresolved_is_pending() {
        let guard = RouteGuard::new();
        let navigator = RecordingNavigator::default();
        assert_eq!(guard.enforce("/users", &navigator), GuardDecision::Pending);
        assert!(navigator.visited.borrow().is_empty());
        assert!(!guard.is_resolved());
    }

    #[test]
    fn test_allowed_route_reports_active_entry() {
        let sequencer = SnapshotSequencer::new();
        let mut guard = RouteGuard::new();
        guard.resolve(sequencer.begin(), allowed()).unwrap();
        assert_eq!(
            guard.decide("/users/detail/7"),
            GuardDecision::Allow {
                active: Some("/users/detail".to_string())
            }
        );
    }

    #[test]
    fn test_redirects_to_first_prefix() {
        let sequencer = SnapshotSequencer::new();
        let mut guard = RouteGuard::new();
        let navigator = RecordingNavigator::default();
        let decision = guard
            .on_snapshot(sequencer.begin(), allowed(), "/settings", &navigator)
            .unwrap();
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/users".to_string()
            }
        );
        assert_eq!(*navigator.visited.borrow(), vec!["/users".to_string()]);

        // Following the redirect settles.
        assert!(matches!(
            guard.enforce("/users", &navigator),
            GuardDecision::Allow { .. }
        ));
        assert_eq!(navigator.visited.borrow().len(), 1);
    }

    #[test]
    fn test_empty_allowed_set_never_redirects() {
        let sequencer = SnapshotSequencer::new();
        let mut guard = RouteGuard::new();
        let navigator = RecordingNavigator::default();
        guard.resolve(sequencer.begin(), AllowedPaths::default()).unwrap();
        for _ in 0..3 {
            assert_eq!(guard.enforce("/users", &navigator), GuardDecision::Empty);
        }
        assert!(navigator.visited.borrow().is_empty());
    }

    #[test]
    fn test_new_snapshot_re_evaluates_route() {
        let sequencer = SnapshotSequencer::new();
        let mut guard = RouteGuard::new();
        let navigator = RecordingNavigator::default();

        let decision = guard
            .on_snapshot(sequencer.begin(), allowed(), "/roles", &navigator)
            .unwrap();
        assert!(matches!(decision, GuardDecision::Allow { .. }));

        let narrowed = AllowedPaths::from_prefixes(["/users"]);
        let decision = guard
            .on_snapshot(sequencer.begin(), narrowed, "/roles", &navigator)
            .unwrap();
        assert_eq!(
            decision,
            GuardDecision::Redirect {
                to: "/users".to_string()
            }
        );
    }

    #[test]
    fn test_stale_snapshot_keeps_current_state() {
        let sequencer = SnapshotSequencer::new();
        let older = sequencer.begin();
        let newer = sequencer.begin();
        let mut guard = RouteGuard::new();

        guard.resolve(newer, allowed()).unwrap();
        assert_eq!(
            guard.resolve(older, AllowedPaths::default()),
            Err(AuthzError::StaleSnapshotDiscarded {
                generation: 1,
                latest: 2
            })
        );
        assert!(matches!(guard.decide("/roles"), GuardDecision::Allow { .. }));
    }

    #[test]
    fn test_reset() {
        let sequencer = SnapshotSequencer::new();
        let mut guard = RouteGuard::new();
        guard.resolve(sequencer.begin(), allowed()).unwrap();
        guard.reset();
        assert_eq!(guard.state(), &GuardState::Unresolved);
        assert_eq!(guard.decide("/users"), GuardDecision::Pending);
    }
}
