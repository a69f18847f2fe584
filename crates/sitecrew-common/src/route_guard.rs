//! Route-guard policy shared with dashboard clients.
//!
//! The browser mirrors the server's authorization rules: a declarative table
//! maps path prefixes to role requirements, and [`resolve`] turns the current
//! auth state plus a navigation target into a rendering decision. While the
//! auth state is still being resolved the answer is `Loading`, a genuine
//! suspension point rather than a default-deny.
//!
//! Matching is exact-first, then longest prefix at a path-segment boundary,
//! so `/settings/billing` can tighten a broader `/settings` rule.

use crate::models::identity::Role;

/// One entry in the guard table.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    /// Path or path prefix this rule covers.
    pub prefix: &'static str,
    /// Roles allowed through. `None` means any authenticated role.
    pub allowed_roles: Option<&'static [Role]>,
    /// Whether the path requires a signed-in identity at all.
    pub require_auth: bool,
    /// Pages like /login that signed-in users should be bounced away from.
    pub public_only: bool,
}

const fn authed(prefix: &'static str, roles: Option<&'static [Role]>) -> RouteRule {
    RouteRule {
        prefix,
        allowed_roles: roles,
        require_auth: true,
        public_only: false,
    }
}

const fn public_only(prefix: &'static str) -> RouteRule {
    RouteRule {
        prefix,
        allowed_roles: None,
        require_auth: false,
        public_only: true,
    }
}

const MANAGEMENT: &[Role] = &[Role::Admin, Role::SiteManager];
const FIELD: &[Role] = &[Role::Admin, Role::SiteManager, Role::Worker];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const CLIENT_ONLY: &[Role] = &[Role::Client];

/// The default dashboard guard table.
pub const DEFAULT_POLICY: &[RouteRule] = &[
    public_only("/login"),
    public_only("/signup"),
    public_only("/verify-email"),
    public_only("/forgot-password"),
    authed("/dashboard", None),
    authed("/sites", Some(MANAGEMENT)),
    authed("/workers", Some(MANAGEMENT)),
    authed("/reports", Some(FIELD)),
    authed("/tools", Some(FIELD)),
    authed("/documents", None),
    authed("/settings", None),
    authed("/settings/billing", Some(ADMIN_ONLY)),
    authed("/admin", Some(ADMIN_ONLY)),
    authed("/client-portal", Some(CLIENT_ONLY)),
];

/// Where each role lands after sign-in or on an authorization bounce.
pub fn default_dashboard(role: Role) -> &'static str {
    match role {
        Role::Admin => "/dashboard",
        Role::SiteManager => "/sites",
        Role::Worker => "/reports",
        Role::Client => "/client-portal",
    }
}

/// Client-side view of the authentication lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Identity not yet resolved (e.g. refresh in flight).
    Resolving,
    Anonymous,
    SignedIn { role: Role },
}

/// What the client should do for a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Render a loading state; no access decision can be made yet.
    Loading,
    Allow,
    /// Unauthenticated on an auth-required path — go to login, come back after.
    RedirectToLogin { return_to: String },
    /// Wrong role, or signed-in on a public-only page.
    Redirect { to: &'static str },
}

/// Find the governing rule for a path: exact match wins, otherwise the
/// longest prefix that ends at a segment boundary.
pub fn match_rule<'a>(path: &str, rules: &'a [RouteRule]) -> Option<&'a RouteRule> {
    if let Some(exact) = rules.iter().find(|r| r.prefix == path) {
        return Some(exact);
    }
    rules
        .iter()
        .filter(|r| {
            path.starts_with(r.prefix)
                && path[r.prefix.len()..].starts_with('/')
        })
        .max_by_key(|r| r.prefix.len())
}

/// Decide what to render for `path` given the current auth state.
pub fn resolve(path: &str, state: AuthState, rules: &[RouteRule]) -> GuardDecision {
    let Some(rule) = match_rule(path, rules) else {
        return GuardDecision::Allow;
    };

    if state == AuthState::Resolving && (rule.require_auth || rule.public_only) {
        return GuardDecision::Loading;
    }

    match state {
        AuthState::Resolving => GuardDecision::Allow,
        AuthState::Anonymous => {
            if rule.require_auth {
                GuardDecision::RedirectToLogin {
                    return_to: path.to_string(),
                }
            } else {
                GuardDecision::Allow
            }
        }
        AuthState::SignedIn { role } => {
            if rule.public_only {
                return GuardDecision::Redirect {
                    to: default_dashboard(role),
                };
            }
            match rule.allowed_roles {
                Some(allowed) if !allowed.contains(&role) => GuardDecision::Redirect {
                    to: default_dashboard(role),
                },
                _ => GuardDecision::Allow,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_auth_suspends_guarded_paths() {
        assert_eq!(
            resolve("/dashboard", AuthState::Resolving, DEFAULT_POLICY),
            GuardDecision::Loading
        );
        assert_eq!(
            resolve("/login", AuthState::Resolving, DEFAULT_POLICY),
            GuardDecision::Loading
        );
    }

    #[test]
    fn anonymous_is_sent_to_login_with_return_path() {
        assert_eq!(
            resolve("/reports/daily/42", AuthState::Anonymous, DEFAULT_POLICY),
            GuardDecision::RedirectToLogin {
                return_to: "/reports/daily/42".into()
            }
        );
    }

    #[test]
    fn anonymous_can_see_public_pages() {
        assert_eq!(
            resolve("/login", AuthState::Anonymous, DEFAULT_POLICY),
            GuardDecision::Allow
        );
        // Unlisted paths are outside the guard's jurisdiction
        assert_eq!(
            resolve("/about", AuthState::Anonymous, DEFAULT_POLICY),
            GuardDecision::Allow
        );
    }

    #[test]
    fn signed_in_users_bounce_off_public_only_pages() {
        assert_eq!(
            resolve(
                "/login",
                AuthState::SignedIn { role: Role::Worker },
                DEFAULT_POLICY
            ),
            GuardDecision::Redirect { to: "/reports" }
        );
    }

    #[test]
    fn role_mismatch_redirects_to_role_dashboard() {
        assert_eq!(
            resolve(
                "/admin",
                AuthState::SignedIn {
                    role: Role::SiteManager
                },
                DEFAULT_POLICY
            ),
            GuardDecision::Redirect { to: "/sites" }
        );
        assert_eq!(
            resolve(
                "/admin/audit",
                AuthState::SignedIn { role: Role::Admin },
                DEFAULT_POLICY
            ),
            GuardDecision::Allow
        );
    }

    #[test]
    fn exact_rule_overrides_broader_prefix() {
        // /settings allows everyone; /settings/billing is admin-only
        assert_eq!(
            resolve(
                "/settings/billing",
                AuthState::SignedIn { role: Role::Worker },
                DEFAULT_POLICY
            ),
            GuardDecision::Redirect { to: "/reports" }
        );
        assert_eq!(
            resolve(
                "/settings/profile",
                AuthState::SignedIn { role: Role::Worker },
                DEFAULT_POLICY
            ),
            GuardDecision::Allow
        );
    }

    #[test]
    fn prefix_matching_respects_segment_boundaries() {
        // "/sites-archive" must not match the "/sites" rule
        assert_eq!(
            resolve("/sites-archive", AuthState::Anonymous, DEFAULT_POLICY),
            GuardDecision::Allow
        );
        assert!(match_rule("/sites/7/progress", DEFAULT_POLICY).is_some());
    }

    #[test]
    fn longest_prefix_wins() {
        let rule = match_rule("/settings/billing/invoices", DEFAULT_POLICY).unwrap();
        assert_eq!(rule.prefix, "/settings/billing");
    }
}
