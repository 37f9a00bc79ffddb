use std::{collections::BTreeSet, fmt, time::Duration};

use crate::ConfigError;

pub const DEFAULT_PORT: u16 = 465;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Recipient local-parts accepted when no allow-list is configured.
pub const DEFAULT_RECIPIENTS: &[&str] = &[
    "henry",
    "tesla",
    "shakespeare",
    "ada",
    "davinci",
    "churchill",
    "dave",
    "chantelle",
    "jade",
    "tarquin",
    "askian",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Endpoint {
            host: host.into(),
            port,
        }
    }
    pub fn host(&self) -> &str {
        &self.host
    }
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Secret(secret.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    account: String,
    secret: Secret,
}

impl Credentials {
    pub fn new(account: impl Into<String>, secret: Secret) -> Self {
        Credentials {
            account: account.into(),
            secret,
        }
    }
    pub fn account(&self) -> &str {
        &self.account
    }
    pub fn secret(&self) -> &Secret {
        &self.secret
    }
}

/// Recipient local-parts (the bit before the `@`) mail may be sent to.
/// Stored and compared in lowercase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    pub fn contains(&self, local_part: &str) -> bool {
        self.0.contains(&local_part.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Parses a comma separated list, ignoring blanks.
    pub fn parse(list: &str) -> Self {
        list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        DEFAULT_RECIPIENTS.iter().copied().collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AllowList(
            iter.into_iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
        )
    }
}

/// Everything a [`SmtpSender`](crate::SmtpSender) needs besides the request.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    endpoint: Endpoint,
    credentials: Credentials,
    sender: String,
    ehlo_domain: String,
    brand: Option<String>,
    allow_list: AllowList,
    timeout: Duration,
}

impl SenderConfig {
    /// Sends as the authenticated account, with the default allow-list and
    /// timeout.
    pub fn new(endpoint: Endpoint, credentials: Credentials) -> Self {
        let sender = credentials.account().to_owned();
        let ehlo_domain = domain_of(&sender).unwrap_or("localhost").to_owned();
        SenderConfig {
            endpoint,
            credentials,
            sender,
            ehlo_domain,
            brand: None,
            allow_list: AllowList::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    #[must_use]
    pub fn with_ehlo_domain(mut self, domain: impl Into<String>) -> Self {
        self.ehlo_domain = domain.into();
        self
    }

    /// Shown after the author's name in the From header, e.g. `Ada via <brand>`.
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    #[must_use]
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Bounds connecting and every single wait on the server.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
    /// envelope sender and From address
    pub fn sender(&self) -> &str {
        &self.sender
    }
    pub fn ehlo_domain(&self) -> &str {
        &self.ehlo_domain
    }
    pub fn brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Loads the configuration from `SMTP_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let host = required("SMTP_HOST")?;
        let port = match var("SMTP_PORT") {
            Some(port) => parse_var("SMTP_PORT", port)?,
            None => DEFAULT_PORT,
        };
        let account = required("SMTP_ACCOUNT")?;
        let secret = Secret::new(required("SMTP_PASSWORD")?);

        let mut config = SenderConfig::new(Endpoint::new(host, port), Credentials::new(account, secret));
        if let Some(ms) = var("SMTP_TIMEOUT_MS") {
            let ms: u64 = parse_var("SMTP_TIMEOUT_MS", ms)?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    name: "SMTP_TIMEOUT_MS",
                    value: ms.to_string(),
                });
            }
            config = config.with_timeout(Duration::from_millis(ms));
        }
        if let Some(sender) = var("SMTP_FROM") {
            if domain_of(&sender).is_none() {
                return Err(ConfigError::Invalid {
                    name: "SMTP_FROM",
                    value: sender,
                });
            }
            config = config.with_sender(sender);
        }
        if let Some(domain) = var("SMTP_EHLO_DOMAIN") {
            config = config.with_ehlo_domain(domain);
        }
        if let Some(brand) = var("SMTP_FROM_BRAND") {
            config = config.with_brand(brand);
        }
        if let Some(list) = var("SMTP_ALLOWED_RECIPIENTS") {
            config = config.with_allow_list(AllowList::parse(&list));
        }
        Ok(config)
    }
}

fn parse_var<V: std::str::FromStr>(name: &'static str, value: String) -> Result<V, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn domain_of(address: &str) -> Option<&str> {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}
