//! Keeps the durable auth flags aligned with whatever session the service
//! last issued.

use turnstile::auth::Session;

use crate::auth_state::AuthState;

/// Interval between proactive token refreshes.
pub(crate) const SESSION_REFRESH_INTERVAL_MS: i32 = 1000 * 60 * 50;

/// The one reconciliation rule. The startup fetch, every change notification
/// and the periodic refresh all funnel through here, so whichever write lands
/// last wins and the flags are never left partial: either fully signed in
/// with a token, or fully signed out.
pub(crate) fn reconcile(state: &mut AuthState, session: Option<&Session>) {
    match session {
        None => state.set_logout(),
        Some(session) => {
            state.set_logged_in(true);
            state.set_token(session.access_token.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnstile::auth::AuthUser;

    fn session_with_token(token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 4_102_444_800,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some("user@example.com".to_string()),
            },
        }
    }

    fn signed_in_state() -> AuthState {
        let mut state = AuthState::default();
        state.set_token("stale".to_string());
        state.set_role(Some("mechanic".to_string()));
        state
    }

    #[test]
    fn test_present_session_sets_token_and_flag() {
        let mut state = AuthState::default();
        reconcile(&mut state, Some(&session_with_token("abc")));
        assert!(state.is_logged_in);
        assert_eq!(state.token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_absent_session_logs_out() {
        let mut state = signed_in_state();
        reconcile(&mut state, None);
        assert!(!state.is_logged_in);
        assert_eq!(state.token, None);
        assert_eq!(state.role, None);
    }

    #[test]
    fn test_absent_rule_is_idempotent() {
        let mut once = signed_in_state();
        reconcile(&mut once, None);

        let mut twice = signed_in_state();
        reconcile(&mut twice, None);
        reconcile(&mut twice, None);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_present_rule_is_idempotent() {
        let session = session_with_token("abc");

        let mut once = AuthState::default();
        reconcile(&mut once, Some(&session));

        let mut twice = AuthState::default();
        reconcile(&mut twice, Some(&session));
        reconcile(&mut twice, Some(&session));

        assert_eq!(once, twice);
    }

    #[test]
    fn test_failed_refresh_logs_out_without_user_action() {
        // The refresh loop applies the absent rule when the service rejects
        // the refresh call; the flags end up fully signed out.
        let mut state = signed_in_state();
        reconcile(&mut state, None);
        assert_eq!(state, AuthState::default());
    }
}
