//! Session state, persistence and change notification.
//!
//! Network calls live in free functions so they can run on the runtime without
//! borrowing the gateway; results are installed with [`SessionGateway::establish`]
//! on the thread that owns it.

use tokio::sync::watch;

use crate::api::client::ApiClient;
use crate::api::models::{NewProfile, ProfileFields, Session, SignUpOutcome};
use crate::config::Config;
use crate::error::{ApiError, AuthError, ConfigError, ValidationErrors};
use crate::routes::AuthState;

/// Sessions this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

const MIN_PASSWORD: usize = 6;
const MIN_NAME: usize = 2;
const MIN_PHONE: usize = 10;

fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    fn check(&self, errors: &mut ValidationErrors) {
        if !is_valid_email(self.email.trim()) {
            errors.push("email", "Please enter a valid email address");
        }
        if self.password.chars().count() < MIN_PASSWORD {
            errors.push("password", "Password must be at least 6 characters");
        }
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        self.check(&mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if self.name.trim().chars().count() < MIN_NAME {
            errors.push("name", "Name must be at least 2 characters");
        }
        LoginForm { email: self.email.clone(), password: self.password.clone() }.check(&mut errors);
        if self.phone.trim().chars().count() < MIN_PHONE {
            errors.push("phone", "Please enter a valid phone number");
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn profile_fields(&self) -> ProfileFields {
        ProfileFields {
            display_name: self.name.trim().to_string(),
            phone_number: self.phone.trim().to_string(),
        }
    }
}

pub async fn sign_in(api: &ApiClient, form: &LoginForm) -> Result<Session, AuthError> {
    form.validate()?;
    let session = api.sign_in_with_password(form.email.trim(), &form.password).await?;
    log::info!("signed in as {}", session.user.id);
    Ok(session)
}

/// Creates the account and its profile row.
pub async fn sign_up(api: &ApiClient, form: &SignupForm) -> Result<SignUpOutcome, AuthError> {
    form.validate()?;
    let fields = form.profile_fields();
    let outcome = api.sign_up(form.email.trim(), &form.password, &fields).await?;
    let (user_id, token) = match &outcome {
        SignUpOutcome::SignedIn(s) => (s.user.id.clone(), Some(s.access_token.as_str())),
        SignUpOutcome::ConfirmationRequired { user_id } => (user_id.clone(), None),
    };
    let profile = NewProfile {
        id: user_id,
        display_name: fields.display_name,
        phone_number: fields.phone_number,
    };
    api.insert_profile(token, &profile).await?;
    log::info!("created account {}", profile.id);
    Ok(outcome)
}

/// Refreshes `session` when it is about to expire. An unusable refresh token yields `None`.
pub async fn restore(api: &ApiClient, session: Session, now: i64) -> Result<Option<Session>, ApiError> {
    if !session.expires_within(now, REFRESH_MARGIN_SECS) {
        return Ok(Some(session));
    }
    match api.refresh_session(&session.refresh_token).await {
        Ok(fresh) => Ok(Some(fresh)),
        Err(ApiError::InvalidCredentials) | Err(ApiError::Status { .. }) => {
            log::info!("stored session for {} can no longer be refreshed", session.user.id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Owns the current session, persists it in the config file and broadcasts changes.
pub struct SessionGateway {
    config: Config,
    tx: watch::Sender<Option<Session>>,
}

impl SessionGateway {
    pub fn new(config: Config) -> Self {
        let (tx, _) = watch::channel(config.session.clone());
        Self { config, tx }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn auth_state(&self) -> AuthState {
        AuthState::from_session(self.tx.borrow().as_ref())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }

    pub fn needs_refresh(&self, now: i64) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .is_some_and(|s| s.expires_within(now, REFRESH_MARGIN_SECS))
    }

    pub fn api(&self) -> Result<ApiClient, ApiError> {
        self.config.api_client()
    }

    /// Points the client at another backend. Any session from the old one is dropped.
    pub fn set_backend(&mut self, backend_url: &str, anon_key: &str) -> Result<(), ConfigError> {
        let url = crate::utils::normalize_url(backend_url);
        if url != self.config.backend_url || anon_key != self.config.anon_key {
            self.config.backend_url = url;
            self.config.anon_key = anon_key.trim().to_string();
            self.config.session = None;
            self.tx.send_replace(None);
        }
        self.config.save()
    }

    pub fn establish(&mut self, session: Session) -> Result<(), ConfigError> {
        self.replace(Some(session))
    }

    pub fn clear(&mut self) -> Result<(), ConfigError> {
        self.replace(None)
    }

    /// Installs the new session and notifies subscribers even if saving it fails.
    fn replace(&mut self, session: Option<Session>) -> Result<(), ConfigError> {
        match &session {
            Some(s) => log::info!("session established for {}", s.user.id),
            None => log::info!("session cleared"),
        }
        self.config.session = session.clone();
        self.tx.send_replace(session);
        self.config.save()
    }
}

pub async fn sign_out(api: &ApiClient, session: &Session) {
    if let Err(e) = api.sign_out(&session.access_token).await {
        log::warn!("logout call failed, clearing local session anyway: {}", e);
    }
}
