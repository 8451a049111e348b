//! Transfer options: target URL, method, headers, form params and localizer.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{HeaderName, HeaderValue};

use super::constants::DEFAULT_METHOD;
use super::error::TransferError;
use super::file::UploadFile;

/// Translates a message template with named parameters.
pub type Localizer = Arc<dyn Fn(&str, &HashMap<String, String>) -> String + Send + Sync>;

/// Where a file's target URL comes from.
#[derive(Clone)]
pub enum UrlSource {
    /// Same URL for every file.
    Fixed(String),
    /// URL computed from the file.
    PerFile(Arc<dyn Fn(&UploadFile) -> String + Send + Sync>),
}

impl UrlSource {
    /// Resolves the URL for a file.
    #[must_use]
    pub fn resolve(&self, file: &UploadFile) -> String {
        match self {
            Self::Fixed(url) => url.clone(),
            Self::PerFile(resolver) => resolver(file),
        }
    }
}

impl fmt::Debug for UrlSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(url) => f.debug_tuple("Fixed").field(url).finish(),
            Self::PerFile(_) => f.write_str("PerFile(..)"),
        }
    }
}

impl From<&str> for UrlSource {
    fn from(url: &str) -> Self {
        Self::Fixed(url.to_string())
    }
}

impl From<String> for UrlSource {
    fn from(url: String) -> Self {
        Self::Fixed(url)
    }
}

/// Validated options for one transfer executor.
#[derive(Clone)]
pub struct TransferOptions {
    url: UrlSource,
    method: Method,
    with_credentials: bool,
    headers: Vec<(HeaderName, HeaderValue)>,
    params: Vec<(String, String)>,
    localizer: Option<Localizer>,
}

impl TransferOptions {
    /// Starts building options for the given URL source.
    #[must_use]
    pub fn builder(url: impl Into<UrlSource>) -> TransferOptionsBuilder {
        TransferOptionsBuilder {
            url: url.into(),
            method: DEFAULT_METHOD.to_string(),
            with_credentials: false,
            headers: Vec::new(),
            params: Vec::new(),
            localizer: None,
        }
    }

    #[must_use]
    pub fn url(&self) -> &UrlSource {
        &self.url
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    /// Caller-supplied headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(HeaderName, HeaderValue)] {
        &self.headers
    }

    /// Additional form fields in insertion order.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Passes a message through the localizer, or returns it unchanged.
    #[must_use]
    pub fn localize(&self, message: &str, params: &HashMap<String, String>) -> String {
        match &self.localizer {
            Some(localizer) => localizer(message, params),
            None => message.to_string(),
        }
    }

    #[must_use]
    pub fn has_localizer(&self) -> bool {
        self.localizer.is_some()
    }
}

impl fmt::Debug for TransferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("with_credentials", &self.with_credentials)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("localizer", &self.localizer.is_some())
            .finish()
    }
}

/// Builder for [`TransferOptions`].
///
/// Values are kept as given and validated in [`build`](Self::build).
pub struct TransferOptionsBuilder {
    url: UrlSource,
    method: String,
    with_credentials: bool,
    headers: Vec<(String, String)>,
    params: Vec<(String, String)>,
    localizer: Option<Localizer>,
}

impl TransferOptionsBuilder {
    /// Sets the HTTP method (default `POST`).
    #[must_use]
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sends cookies from the transport's jar with each request.
    #[must_use]
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    /// Adds a request header; a later value for the same name replaces the earlier one.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        upsert(&mut self.headers, name.into(), value.to_string(), true);
        self
    }

    /// Adds an extra multipart form field.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        upsert(&mut self.params, name.into(), value.to_string(), false);
        self
    }

    /// Sets the message localizer.
    #[must_use]
    pub fn localizer(
        mut self,
        localizer: impl Fn(&str, &HashMap<String, String>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.localizer = Some(Arc::new(localizer));
        self
    }

    /// Validates and builds the options.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidOptions`] for an invalid method,
    /// header name, header value, or an empty fixed URL.
    pub fn build(self) -> Result<TransferOptions, TransferError> {
        if let UrlSource::Fixed(url) = &self.url
            && url.trim().is_empty()
        {
            return Err(TransferError::invalid_options("upload URL must not be empty"));
        }

        let method = Method::from_bytes(self.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| {
                TransferError::invalid_options(format!("invalid HTTP method '{}'", self.method))
            })?;

        let headers = self
            .headers
            .into_iter()
            .map(|(name, value)| {
                let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                    TransferError::invalid_options(format!("invalid header name '{name}'"))
                })?;
                let header_value = HeaderValue::from_str(&value).map_err(|_| {
                    TransferError::invalid_options(format!("invalid value for header '{name}'"))
                })?;
                Ok((header_name, header_value))
            })
            .collect::<Result<Vec<_>, TransferError>>()?;

        Ok(TransferOptions {
            url: self.url,
            method,
            with_credentials: self.with_credentials,
            headers,
            params: self.params,
            localizer: self.localizer,
        })
    }
}

fn upsert(entries: &mut Vec<(String, String)>, name: String, value: String, ignore_case: bool) {
    let existing = entries.iter_mut().find(|(existing, _)| {
        if ignore_case {
            existing.eq_ignore_ascii_case(&name)
        } else {
            *existing == name
        }
    });
    match existing {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}
