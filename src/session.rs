// 🧭 Session - per-interactive-session state machine
//
//   Login ──login ok──▶ Main ──logout──▶ Login
//     ▲  │
//     │  └─go to register─▶ Register ──register ok / go to login──┘
//
// One Session per interactive user, owned by whoever drives the surface.

use crate::applicant::RawApplicant;
use crate::credentials::{CredentialStore, RegisterOutcome, UserStorage};
use crate::model::Predictor;
use anyhow::Result;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Login,
    Register,
    Main,
}

impl Page {
    pub fn title(&self) -> &str {
        match self {
            Page::Login => "Login",
            Page::Register => "Register",
            Page::Main => "Loan Approval Prediction App",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// Inline message rendered under the active screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

pub const MSG_LOGGED_IN: &str = "Logged in successfully!";
pub const MSG_BAD_LOGIN: &str = "Invalid credentials or empty fields.";
pub const MSG_EMPTY_FIELDS: &str = "Please fill in all fields.";
pub const MSG_REGISTERED: &str = "User registered successfully! Please log in.";
pub const MSG_TAKEN: &str = "Username already taken.";
pub const MSG_NOT_LOGGED_IN: &str = "Please log in first.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    logged_in: bool,
    username: Option<String>,
    page: Page,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            logged_in: false,
            username: None,
            page: Page::Login,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Screen to render. Main needs a login; Login/Register need the
    /// session logged out. Any other combination renders nothing.
    pub fn visible_page(&self) -> Option<Page> {
        match (self.logged_in, self.page) {
            (true, Page::Main) => Some(Page::Main),
            (false, Page::Login) => Some(Page::Login),
            (false, Page::Register) => Some(Page::Register),
            _ => None,
        }
    }

    pub fn go_to_register(&mut self) {
        self.page = Page::Register;
    }

    pub fn go_to_login(&mut self) {
        self.page = Page::Login;
    }

    pub fn login<S: UserStorage>(
        &mut self,
        store: &CredentialStore<S>,
        username: &str,
        password: &str,
    ) -> Result<Notice> {
        if !username.is_empty() && !password.is_empty() && store.login(username, password)? {
            self.logged_in = true;
            self.username = Some(username.to_string());
            self.page = Page::Main;
            Ok(Notice::success(MSG_LOGGED_IN))
        } else {
            Ok(Notice::error(MSG_BAD_LOGIN))
        }
    }

    pub fn register<S: UserStorage>(
        &mut self,
        store: &CredentialStore<S>,
        username: &str,
        password: &str,
    ) -> Result<Notice> {
        if username.is_empty() || password.is_empty() {
            return Ok(Notice::error(MSG_EMPTY_FIELDS));
        }

        match store.register(username, password)? {
            RegisterOutcome::Registered => {
                self.page = Page::Login;
                Ok(Notice::success(MSG_REGISTERED))
            }
            RegisterOutcome::AlreadyExists => Ok(Notice::error(MSG_TAKEN)),
        }
    }

    pub fn logout(&mut self) {
        self.logged_in = false;
        self.username = None;
        self.page = Page::Login;
    }

    /// Run one prediction for the logged-in user. Every failure becomes an
    /// error notice; the session itself is never affected.
    pub fn predict<S: UserStorage>(
        &self,
        predictor: &Predictor,
        store: &CredentialStore<S>,
        raw: &RawApplicant,
    ) -> Notice {
        let username = match (self.logged_in, self.username.as_deref()) {
            (true, Some(username)) => username,
            _ => return Notice::error(MSG_NOT_LOGGED_IN),
        };

        match predictor.predict(raw) {
            Ok(verdict) => {
                store.record_prediction(username, verdict.as_str());
                Notice::info(verdict.message())
            }
            Err(e) if e.is_user_input() => Notice::error(e.to_string()),
            Err(e) => {
                warn!(username, error = %e, "Prediction failed");
                Notice::error(format!("Prediction failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteUserStore;
    use crate::model::tests::{reference_applicant, StubClassifier};

    fn store() -> CredentialStore<SqliteUserStore> {
        CredentialStore::new(SqliteUserStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_initial_state() {
        let session = Session::new();

        assert!(!session.is_logged_in());
        assert_eq!(session.username(), None);
        assert_eq!(session.page(), Page::Login);
        assert_eq!(session.visible_page(), Some(Page::Login));
    }

    #[test]
    fn test_navigation_between_logged_out_pages() {
        let mut session = Session::new();

        session.go_to_register();
        assert_eq!(session.visible_page(), Some(Page::Register));
        assert!(!session.is_logged_in());

        session.go_to_login();
        assert_eq!(session.visible_page(), Some(Page::Login));
        assert!(!session.is_logged_in());
    }

    #[test]
    fn test_register_then_login_then_logout() {
        let store = store();
        let mut session = Session::new();

        session.go_to_register();
        let notice = session.register(&store, "alice", "pw1").unwrap();
        assert_eq!(notice, Notice::success(MSG_REGISTERED));
        assert_eq!(session.page(), Page::Login);
        assert!(!session.is_logged_in());

        let notice = session.login(&store, "alice", "pw1").unwrap();
        assert_eq!(notice, Notice::success(MSG_LOGGED_IN));
        assert!(session.is_logged_in());
        assert_eq!(session.username(), Some("alice"));
        assert_eq!(session.visible_page(), Some(Page::Main));

        session.logout();
        assert!(!session.is_logged_in());
        assert_eq!(session.username(), None);
        assert_eq!(session.visible_page(), Some(Page::Login));
    }

    #[test]
    fn test_register_rejections_stay_on_register() {
        let store = store();
        let mut session = Session::new();
        session.go_to_register();

        let notice = session.register(&store, "", "pw").unwrap();
        assert_eq!(notice.text, MSG_EMPTY_FIELDS);
        assert!(store.list_users().unwrap().is_empty());

        session.register(&store, "alice", "pw1").unwrap();
        session.go_to_register();
        let notice = session.register(&store, "alice", "pw2").unwrap();
        assert_eq!(notice, Notice::error(MSG_TAKEN));
        assert_eq!(session.page(), Page::Register);
    }

    #[test]
    fn test_failed_login_is_generic() {
        let store = store();
        store.register("alice", "pw1").unwrap();
        let mut session = Session::new();

        let wrong_password = session.login(&store, "alice", "wrong").unwrap();
        let unknown_user = session.login(&store, "bob", "x").unwrap();
        let empty = session.login(&store, "", "").unwrap();

        assert_eq!(wrong_password, Notice::error(MSG_BAD_LOGIN));
        assert_eq!(unknown_user, wrong_password);
        assert_eq!(empty, wrong_password);
        assert_eq!(session.visible_page(), Some(Page::Login));
    }

    #[test]
    fn test_main_page_hidden_when_logged_out() {
        let mut session = Session::new();
        session.page = Page::Main;
        assert_eq!(session.visible_page(), None);
    }

    #[test]
    fn test_predict_requires_login() {
        let store = store();
        let predictor = Predictor::new(StubClassifier::returning(1));
        let session = Session::new();

        let notice = session.predict(&predictor, &store, &reference_applicant());
        assert_eq!(notice, Notice::error(MSG_NOT_LOGGED_IN));
    }

    #[test]
    fn test_predict_renders_verdict_and_errors() {
        let store = store();
        store.register("alice", "pw1").unwrap();
        let mut session = Session::new();
        session.login(&store, "alice", "pw1").unwrap();

        let approve = Predictor::new(StubClassifier::returning(1));
        let notice = session.predict(&approve, &store, &reference_applicant());
        assert_eq!(notice, Notice::info("Loan Approved ✅"));

        let deny = Predictor::new(StubClassifier::returning(0));
        let notice = session.predict(&deny, &store, &reference_applicant());
        assert_eq!(notice, Notice::info("Loan Denied ❌"));

        let mut raw = reference_applicant();
        raw.applicant_income = 0.0;
        let notice = session.predict(&approve, &store, &raw);
        assert_eq!(notice, Notice::error("Applicant Income must be greater than zero."));

        let broken = Predictor::new(StubClassifier::returning(5));
        let notice = session.predict(&broken, &store, &reference_applicant());
        assert!(notice.is_error());
        assert!(notice.text.starts_with("Prediction failed:"));

        // The session survives a failed request
        assert!(session.is_logged_in());
        assert_eq!(session.visible_page(), Some(Page::Main));
    }
}
