//! Authenticated API session for one command.
//!
//! The session owns the credential store and prompt, builds an
//! [`ApiClient`] on demand, re-prompts when the API rejects the stored
//! credentials, and asks for billing confirmation when an action needs it.

use std::future::Future;

use reqwest::header::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::client::{ApiClient, ApiResponse};
use crate::config::Config;
use crate::credentials::{CredentialStore, Credentials};
use crate::endpoints::{self, Endpoint};
use crate::error::{ApiError, CliError, LogError};
use crate::terminal::Prompt;

/// Re-prompts allowed after the API rejects credentials.
pub const MAX_REPROMPTS: usize = 3;

/// Errors that can mean the API rejected the session's credentials.
pub trait AuthRejection {
    /// Whether the credentials were rejected.
    fn is_auth_rejection(&self) -> bool;
}

impl AuthRejection for ApiError {
    fn is_auth_rejection(&self) -> bool {
        self.is_unauthorized()
    }
}

impl AuthRejection for LogError {
    fn is_auth_rejection(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_unauthorized())
    }
}

/// Result of an action that may need the user's billing confirmation.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The action completed.
    Done(T),
    /// The API asked for billing confirmation first.
    NeedsConfirmation {
        /// Server-supplied explanation.
        message: String,
    },
}

impl<T> Attempt<T> {
    /// Split a call result into completion, a confirmation request, or a
    /// hard error.
    ///
    /// # Errors
    ///
    /// Returns `result`'s error unless it is a billing confirmation request.
    pub fn from_result(result: Result<T, CliError>) -> Result<Self, CliError> {
        match result {
            Ok(value) => Ok(Self::Done(value)),
            Err(CliError::Api(ApiError::PaymentRequired { message })) => {
                Ok(Self::NeedsConfirmation { message })
            }
            Err(e) => Err(e),
        }
    }
}

/// API access for one command invocation.
pub struct Session<P> {
    config: Config,
    store: CredentialStore,
    prompt: P,
    client: Option<ApiClient>,
}

impl<P> std::fmt::Debug for Session<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_url", &self.config.api_url.as_str())
            .field("credentials", &self.store.path())
            .field("api_key", &self.config.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl<P: Prompt> Session<P> {
    /// Create a session using `config` and asking questions through `prompt`.
    pub fn new(config: Config, prompt: P) -> Self {
        let store = CredentialStore::new(config.credentials_path());
        Self {
            config,
            store,
            prompt,
            client: None,
        }
    }

    /// Session configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The credential store.
    #[must_use]
    pub const fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// The prompt, for command-level questions.
    pub fn prompt(&mut self) -> &mut P {
        &mut self.prompt
    }

    /// Credentials for this session: the API key when set, otherwise the
    /// stored pair, prompting when there is none.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Io`] if the store or prompt fails.
    pub fn credentials(&mut self) -> Result<Credentials, CliError> {
        if let Some(key) = &self.config.api_key {
            return Ok(Credentials::new("", key.clone()));
        }
        Ok(self.store.load(&mut self.prompt)?)
    }

    /// The API client, built from the current credentials.
    ///
    /// # Errors
    ///
    /// See [`Session::credentials`].
    pub fn client(&mut self) -> Result<&ApiClient, CliError> {
        if self.client.is_none() {
            let credentials = self.credentials()?;
            let client =
                ApiClient::new(self.config.api_url.clone(), credentials, HeaderMap::new())?;
            self.client = Some(client);
        }
        self.client
            .as_ref()
            .ok_or_else(|| CliError::Config("API client unavailable".into()))
    }

    /// Prompt for new credentials, store them, and verify them against the
    /// account endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::AuthenticationFailure`] if the API rejects them;
    /// the stored file is removed in that case.
    pub async fn login(&mut self) -> Result<Value, CliError> {
        if self.config.api_key.is_some() {
            return Err(CliError::Config(format!(
                "{} is set; unset it to log in interactively",
                crate::config::API_KEY_ENV
            )));
        }
        self.store.prompt_and_save(&mut self.prompt)?;
        self.client = None;

        let client = self.client()?.clone();
        match client.call(&endpoints::ACCOUNT, &[], &[], None).await {
            Ok(response) => Ok(response.body.as_json().cloned().unwrap_or(Value::Null)),
            Err(e) if e.is_unauthorized() => {
                self.forget()?;
                Err(CliError::AuthenticationFailure)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Io`] if the file cannot be removed.
    pub fn logout(&mut self) -> Result<(), CliError> {
        self.forget()
    }

    fn forget(&mut self) -> Result<(), CliError> {
        self.store.clear()?;
        self.client = None;
        Ok(())
    }

    /// Run `action` with the session's client, re-prompting for credentials
    /// up to [`MAX_REPROMPTS`] times while the API answers 401.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::AuthenticationFailure`] once re-prompts are
    /// exhausted (immediately with an API key), otherwise the action's error.
    pub async fn with_auth<T, E, F, Fut>(&mut self, mut action: F) -> Result<T, CliError>
    where
        F: FnMut(ApiClient) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AuthRejection,
        CliError: From<E>,
    {
        let mut reprompts = 0usize;
        loop {
            let client = self.client()?.clone();
            match action(client).await {
                Err(e) if e.is_auth_rejection() => {
                    if self.config.api_key.is_some() {
                        return Err(CliError::AuthenticationFailure);
                    }
                    self.forget()?;
                    if reprompts == MAX_REPROMPTS {
                        warn!(attempts = reprompts + 1, "credentials rejected; giving up");
                        return Err(CliError::AuthenticationFailure);
                    }
                    reprompts += 1;
                    warn!(reprompt = reprompts, "authentication failure; asking for credentials");
                    self.store.prompt_and_save(&mut self.prompt)?;
                }
                other => return other.map_err(CliError::from),
            }
        }
    }

    /// Call a catalog endpoint with credential re-prompting.
    ///
    /// # Errors
    ///
    /// See [`Session::with_auth`].
    pub async fn call(
        &mut self,
        endpoint: &Endpoint,
        params: &[(&str, &str)],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, CliError> {
        self.with_auth(move |client| async move { client.call(endpoint, params, query, body).await })
            .await
    }

    /// Call an endpoint whose action may be billed, asking the user to
    /// confirm billing and retrying once when the API requires it.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Cancelled`] if the user declines, otherwise the
    /// call's error.
    pub async fn call_billable(
        &mut self,
        endpoint: &Endpoint,
        params: &[(&str, &str)],
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, CliError> {
        let first = self.call(endpoint, params, query, body).await;
        let message = match Attempt::from_result(first)? {
            Attempt::Done(response) => return Ok(response),
            Attempt::NeedsConfirmation { message } => message,
        };

        debug!(endpoint = endpoint.name, "billing confirmation required");
        let question = format!("{message}\nAre you sure you want to do this?");
        if !self.prompt.confirm(&question)? {
            return Err(CliError::Cancelled("billing not confirmed".into()));
        }

        let user = self.client()?.credentials().identity.clone();
        self.call(&endpoints::CONFIRM_BILLING, &[("user", &user)], &[], None)
            .await?;

        match Attempt::from_result(self.call(endpoint, params, query, body).await)? {
            Attempt::Done(response) => Ok(response),
            Attempt::NeedsConfirmation { message } => {
                Err(ApiError::PaymentRequired { message }.into())
            }
        }
    }
}
