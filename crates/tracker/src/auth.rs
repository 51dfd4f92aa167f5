//! Signed-in user and profile state.
//!
//! Two external streams drive the state: auth changes from the identity
//! provider and changes to the signed-in user's profile document.
//! [`apply`] is the whole transition table; [`AuthObserver`] runs it over
//! both streams and publishes the result on a `watch` channel.

use common::records::Person;
use common::ServiceError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::PersonRepository;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// Signed in; profile lookup in flight.
    Loading { uid: String },
    Authenticated { uid: String, profile: Person },
    /// Signed in, but no profile document is registered for the account.
    AuthenticatedNoProfile { uid: String },
}

impl AuthState {
    pub fn uid(&self) -> Option<&str> {
        match self {
            AuthState::Unauthenticated => None,
            AuthState::Loading { uid }
            | AuthState::Authenticated { uid, .. }
            | AuthState::AuthenticatedNoProfile { uid } => Some(uid),
        }
    }

    pub fn profile(&self) -> Option<&Person> {
        match self {
            AuthState::Authenticated { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
    SignedIn { uid: String },
    SignedOut,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileChange {
    Loaded(Person),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    Auth(AuthChange),
    Profile(ProfileChange),
}

/// Next state after `event`.
///
/// Profile changes arriving while signed out are stale and ignored. Signing
/// in again as the current user keeps the resolved profile.
pub fn apply(state: &AuthState, event: AuthEvent) -> AuthState {
    match (state, event) {
        (_, AuthEvent::Auth(AuthChange::SignedOut)) => AuthState::Unauthenticated,
        (current, AuthEvent::Auth(AuthChange::SignedIn { uid })) => {
            if current.uid() == Some(uid.as_str()) {
                current.clone()
            } else {
                AuthState::Loading { uid }
            }
        }
        (AuthState::Unauthenticated, AuthEvent::Profile(_)) => AuthState::Unauthenticated,
        (current, AuthEvent::Profile(ProfileChange::Loaded(profile))) => AuthState::Authenticated {
            uid: current.uid().unwrap_or_default().to_owned(),
            profile,
        },
        (current, AuthEvent::Profile(ProfileChange::Missing)) => AuthState::AuthenticatedNoProfile {
            uid: current.uid().unwrap_or_default().to_owned(),
        },
    }
}

/// Background task folding both event streams into a published state.
pub struct AuthObserver {
    state: watch::Receiver<AuthState>,
    task: JoinHandle<()>,
}

impl AuthObserver {
    /// Start observing. The task ends once both senders are dropped.
    pub fn spawn(
        mut auth_rx: mpsc::Receiver<AuthChange>,
        mut profile_rx: mpsc::Receiver<ProfileChange>,
    ) -> Self {
        let (tx, state) = watch::channel(AuthState::Unauthenticated);
        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    Some(change) = auth_rx.recv() => AuthEvent::Auth(change),
                    Some(change) = profile_rx.recv() => AuthEvent::Profile(change),
                    else => break,
                };
                tx.send_if_modified(|current| {
                    let next = apply(current, event);
                    if next == *current {
                        return false;
                    }
                    info!(from = state_name(current), to = state_name(&next), "auth state changed");
                    *current = next;
                    true
                });
            }
            debug!("auth event streams closed");
        });
        Self { state, task }
    }

    pub fn current(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Wait for the task to drain after both senders are dropped.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

fn state_name(state: &AuthState) -> &'static str {
    match state {
        AuthState::Unauthenticated => "unauthenticated",
        AuthState::Loading { .. } => "loading",
        AuthState::Authenticated { .. } => "authenticated",
        AuthState::AuthenticatedNoProfile { .. } => "authenticated_no_profile",
    }
}

/// Look up the profile registered under `email`.
///
/// # Errors
///
/// [`ServiceError::MissingEmail`] when no person record has this email.
pub async fn resolve_profile(
    people: &dyn PersonRepository,
    email: &str,
) -> Result<Person, ServiceError> {
    people
        .person_by_email(email)
        .await?
        .ok_or_else(|| ServiceError::MissingEmail(email.to_owned()))
}

/// Profile change to feed the observer for `email`.
pub async fn profile_change(
    people: &dyn PersonRepository,
    email: &str,
) -> Result<ProfileChange, ServiceError> {
    match resolve_profile(people, email).await {
        Ok(person) => Ok(ProfileChange::Loaded(person)),
        Err(ServiceError::MissingEmail(_)) => Ok(ProfileChange::Missing),
        Err(e) => Err(e),
    }
}
