//! Login and signup form handling.
//!
//! The session store accepts anything; these forms are the only place input
//! is checked before a session is started.

use crate::session::{SessionError, SessionStore};

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Email is required")]
    EmailRequired,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.email.is_empty() {
            return Err(FormError::EmailRequired);
        }
        Ok(())
    }

    /// Validate, then log in. Nothing is attempted on a validation error.
    pub fn submit(&self, store: &mut SessionStore) -> Result<(), FormError> {
        self.validate()?;
        store.login(&self.email, &self.password)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn new(email: &str, password: &str, confirm_password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
            confirm_password: confirm_password.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.email.is_empty() {
            return Err(FormError::EmailRequired);
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    pub fn submit(&self, store: &mut SessionStore) -> Result<(), FormError> {
        self.validate()?;
        store.signup(&self.email, &self.password)?;
        Ok(())
    }
}
