//! Navigation to the login entry point
//!
//! When a session cannot be recovered the pipeline destroys it and asks the
//! front end, through [`LoginRedirect`], to send the user back to login.

use tracing::warn;

/// Sends the user to the login entry point
pub trait LoginRedirect: Send + Sync {
    /// Called once each time the pipeline destroys an unrecoverable session
    fn redirect_to_login(&self);
}

impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}

/// Redirect that only records the event in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!("Session ended, login required");
    }
}
