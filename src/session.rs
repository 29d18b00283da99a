/// Session store — identity state for the running client.
///
/// Two states: logged out, or logged in as a username. One transient status
/// message slot rides along for the login/signup screens. The store never
/// talks to the network; the TUI drives transitions from backend responses.

pub const MIN_PASSWORD_LEN: usize = 8;

/// Shown after the signup flow reports success; the user still has to log in.
pub const REGISTERED_MESSAGE: &str =
    "The user has registered successfully. Please return to the login tab.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
}

#[derive(Default)]
pub struct SessionStore {
    session: Option<Session>,
    status: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.username.as_str())
    }

    /// Visible status message, if any (login failure, signup confirmation).
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Backend accepted the credentials: move to LoggedIn and clear any prior
    /// status. The caller triggers the history fetch.
    pub fn login_succeeded(&mut self, username: &str) {
        self.session = Some(Session {
            username: username.to_string(),
        });
        self.status = None;
    }

    /// Backend rejected the credentials: stay LoggedOut, surface its message.
    pub fn login_failed(&mut self, message: &str) {
        self.session = None;
        self.status = Some(message.to_string());
    }

    /// Signup reported success: confirmation message, still LoggedOut —
    /// an explicit login is required.
    pub fn register_succeeded(&mut self) {
        self.status = Some(REGISTERED_MESSAGE.to_string());
    }

    /// Unconditional local reset. Never blocks on the backend; the
    /// end-session notification is the caller's fire-and-forget problem.
    pub fn logged_out(&mut self) {
        self.session = None;
        self.status = None;
    }
}

// ── Signup pre-validation ─────────────────────────────────────────────────────

/// Client-side checks run before the signup request goes out. Pre-checks
/// only — the backend remains authoritative.
pub fn validate_signup(email: &str, password: &str, email_domain: &str) -> Result<(), String> {
    if !email.ends_with(email_domain) {
        return Err(format!("Email must end with \"{email_domain}\""));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_transitions() {
        let mut store = SessionStore::new();
        assert!(!store.is_authenticated());

        store.login_failed("Invalid credentials");
        assert!(!store.is_authenticated());
        assert_eq!(store.status(), Some("Invalid credentials"));

        store.login_succeeded("ali");
        assert!(store.is_authenticated());
        assert_eq!(store.username(), Some("ali"));
        // Prior failure message is cleared on success
        assert_eq!(store.status(), None);
    }

    #[test]
    fn test_register_success_stays_logged_out() {
        let mut store = SessionStore::new();
        store.register_succeeded();
        assert!(!store.is_authenticated());
        assert_eq!(store.status(), Some(REGISTERED_MESSAGE));
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut store = SessionStore::new();
        store.login_succeeded("ali");
        store.logged_out();
        assert!(!store.is_authenticated());
        assert_eq!(store.username(), None);
        assert_eq!(store.status(), None);
    }

    #[test]
    fn test_signup_validation() {
        let domain = "@umt.edu.pk";
        assert!(validate_signup("a@umt.edu.pk", "longenough", domain).is_ok());
        assert!(validate_signup("a@gmail.com", "longenough", domain)
            .unwrap_err()
            .contains(domain));
        assert!(validate_signup("a@umt.edu.pk", "short", domain)
            .unwrap_err()
            .contains("8"));
        // Email check fires first
        assert!(validate_signup("a@gmail.com", "short", domain)
            .unwrap_err()
            .contains("Email"));
    }
}
