//! Declarative catalog of the platform API endpoints.
//!
//! Every remote call the CLI makes is described by an [`Endpoint`] constant
//! and executed by [`crate::client::ApiClient::call`].

use url::Url;

use crate::error::ApiError;

/// HTTP verb of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Verb {
    /// The matching `reqwest` method.
    #[must_use]
    pub fn as_method(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Media type an endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Unversioned legacy resources.
    Legacy,
    /// `application/vnd.stratus+json; version=N`.
    Versioned(u8),
}

impl MediaType {
    /// Value for the `Accept` header.
    #[must_use]
    pub fn accept(self) -> String {
        match self {
            Self::Legacy => "application/json".to_string(),
            Self::Versioned(version) => format!("application/vnd.stratus+json; version={version}"),
        }
    }
}

/// One API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Short name used in logs and errors.
    pub name: &'static str,
    /// HTTP verb.
    pub verb: Verb,
    /// Path template; `{param}` segments are substituted and percent-encoded.
    pub path: &'static str,
    /// Media type.
    pub media: MediaType,
    /// Success statuses.
    pub expected: &'static [u16],
}

impl Endpoint {
    /// Whether `status` is a success for this endpoint.
    #[must_use]
    pub fn accepts(&self, status: u16) -> bool {
        self.expected.contains(&status)
    }

    /// Path segments with parameters substituted (not yet encoded).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if a template parameter has no value.
    pub fn segments<'a>(&self, params: &[(&str, &'a str)]) -> Result<Vec<&'a str>, ApiError> {
        self.path
            .trim_start_matches('/')
            .split('/')
            .map(|segment| {
                match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    Some(key) => params
                        .iter()
                        .find(|(name, _)| *name == key)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            ApiError::InvalidUrl(format!("{}: missing parameter `{key}`", self.name))
                        }),
                    None => Ok(segment),
                }
            })
            .collect()
    }

    /// Full URL of this endpoint under `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if a parameter is missing or `base`
    /// cannot carry a path.
    pub fn url(&self, base: &Url, params: &[(&str, &str)]) -> Result<Url, ApiError> {
        let segments = self.segments(params)?;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(format!("{base} cannot be a base URL")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

const OK: &[u16] = &[200];
const OK_OR_CREATED: &[u16] = &[200, 201];
const OK_OR_ACCEPTED: &[u16] = &[200, 202];
const OK_OR_EMPTY: &[u16] = &[200, 204];

/// Current account.
pub const ACCOUNT: Endpoint = Endpoint {
    name: "account",
    verb: Verb::Get,
    path: "/account",
    media: MediaType::Versioned(3),
    expected: OK,
};

/// Apps owned by or shared with the account.
pub const APP_LIST: Endpoint = Endpoint {
    name: "app-list",
    verb: Verb::Get,
    path: "/apps",
    media: MediaType::Legacy,
    expected: OK,
};

/// Details for one app.
pub const APP_INFO: Endpoint = Endpoint {
    name: "app-info",
    verb: Verb::Get,
    path: "/apps/{app}",
    media: MediaType::Legacy,
    expected: OK,
};

/// Create an app.
pub const APP_CREATE: Endpoint = Endpoint {
    name: "app-create",
    verb: Verb::Post,
    path: "/apps",
    media: MediaType::Legacy,
    expected: OK_OR_ACCEPTED,
};

/// Rename an app.
pub const APP_RENAME: Endpoint = Endpoint {
    name: "app-rename",
    verb: Verb::Put,
    path: "/apps/{app}",
    media: MediaType::Legacy,
    expected: OK,
};

/// Destroy an app.
pub const APP_DESTROY: Endpoint = Endpoint {
    name: "app-destroy",
    verb: Verb::Delete,
    path: "/apps/{app}",
    media: MediaType::Legacy,
    expected: OK_OR_EMPTY,
};

/// Config vars of an app.
pub const CONFIG_VARS: Endpoint = Endpoint {
    name: "config-vars",
    verb: Verb::Get,
    path: "/apps/{app}/config_vars",
    media: MediaType::Legacy,
    expected: OK,
};

/// Set config vars.
pub const CONFIG_SET: Endpoint = Endpoint {
    name: "config-set",
    verb: Verb::Put,
    path: "/apps/{app}/config_vars",
    media: MediaType::Legacy,
    expected: OK,
};

/// Remove one config var.
pub const CONFIG_UNSET: Endpoint = Endpoint {
    name: "config-unset",
    verb: Verb::Delete,
    path: "/apps/{app}/config_vars/{key}",
    media: MediaType::Legacy,
    expected: OK_OR_EMPTY,
};

/// Processes of an app.
pub const PS_LIST: Endpoint = Endpoint {
    name: "ps-list",
    verb: Verb::Get,
    path: "/apps/{app}/ps",
    media: MediaType::Legacy,
    expected: OK,
};

/// Restart all processes or one process type.
pub const PS_RESTART: Endpoint = Endpoint {
    name: "ps-restart",
    verb: Verb::Post,
    path: "/apps/{app}/ps/restart",
    media: MediaType::Legacy,
    expected: OK,
};

/// Start a one-off process; with `attach` the response carries a
/// rendezvous URL.
pub const PS_RUN: Endpoint = Endpoint {
    name: "ps-run",
    verb: Verb::Post,
    path: "/apps/{app}/ps",
    media: MediaType::Legacy,
    expected: OK_OR_CREATED,
};

/// Open a log session; the response body is the streaming URL.
pub const LOG_SESSION: Endpoint = Endpoint {
    name: "log-session",
    verb: Verb::Get,
    path: "/apps/{app}/logs",
    media: MediaType::Legacy,
    expected: OK,
};

/// Confirm that the account may be billed.
pub const CONFIRM_BILLING: Endpoint = Endpoint {
    name: "confirm-billing",
    verb: Verb::Post,
    path: "/user/{user}/confirm_billing",
    media: MediaType::Legacy,
    expected: OK,
};

/// Every endpoint, for diagnostics and tests.
pub const CATALOG: &[Endpoint] = &[
    ACCOUNT,
    APP_LIST,
    APP_INFO,
    APP_CREATE,
    APP_RENAME,
    APP_DESTROY,
    CONFIG_VARS,
    CONFIG_SET,
    CONFIG_UNSET,
    PS_LIST,
    PS_RESTART,
    PS_RUN,
    LOG_SESSION,
    CONFIRM_BILLING,
];

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn base() -> Url {
        Url::parse("https://api.stratusapp.com").expect("url")
    }

    #[test]
    fn catalog_names_are_unique() {
        let names: HashSet<_> = CATALOG.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn catalog_paths_are_absolute_and_expect_success() {
        for endpoint in CATALOG {
            assert!(endpoint.path.starts_with('/'), "{}", endpoint.name);
            assert!(!endpoint.expected.is_empty(), "{}", endpoint.name);
            assert!(endpoint.expected.iter().all(|s| (200..300).contains(s)));
        }
    }

    #[test]
    fn url_substitutes_params() {
        let url = CONFIG_UNSET
            .url(&base(), &[("app", "demo"), ("key", "DATABASE_URL")])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.stratusapp.com/apps/demo/config_vars/DATABASE_URL"
        );
    }

    #[test]
    fn url_percent_encodes_params() {
        let url = CONFIRM_BILLING
            .url(&base(), &[("user", "dev@example.com/x")])
            .expect("url");
        assert_eq!(
            url.path(),
            "/user/dev@example.com%2Fx/confirm_billing"
        );
    }

    #[test]
    fn url_keeps_empty_app_segment() {
        let url = APP_INFO.url(&base(), &[("app", "")]).expect("url");
        assert_eq!(url.path(), "/apps/");
    }

    #[test]
    fn missing_param_is_an_error() {
        let err = APP_INFO.url(&base(), &[]).expect_err("missing app");
        assert!(err.to_string().contains("missing parameter `app`"));
    }

    #[test]
    fn media_type_accept_headers() {
        assert_eq!(MediaType::Legacy.accept(), "application/json");
        assert_eq!(
            MediaType::Versioned(3).accept(),
            "application/vnd.stratus+json; version=3"
        );
    }

    #[test]
    fn accepts_only_listed_statuses() {
        assert!(APP_DESTROY.accepts(204));
        assert!(!APP_INFO.accepts(204));
    }
}
