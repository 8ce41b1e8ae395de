use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use thiserror::Error;
use url::{Host, Url};

pub const SCHEME: &str = "sshconnect";

// query values may not carry their own separators
const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>');

const USERINFO: &AsciiSet = &QUERY_VALUE.add(b'/').add(b':').add(b'?').add(b'@');

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("invalid url: {0}")]
    Invalid(#[from] url::ParseError),
    #[error("unsupported scheme `{0}`")]
    Scheme(String),
    #[error("url has no host")]
    MissingHost,
    #[error("host `{0}` would be read as an ssh option")]
    OptionHost(String),
}

/// A connection request decoded from an `sshconnect://` url.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub terminal: Option<String>,
    pub account: Option<String>,
    pub required_version: u32,
}

impl ConnectionRequest {
    pub fn for_alias(alias: impl Into<String>) -> Self {
        Self {
            host: alias.into(),
            user: None,
            port: None,
            terminal: None,
            account: None,
            required_version: 0,
        }
    }

    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let url = Url::parse(input)?;
        if url.scheme() != SCHEME {
            return Err(UrlError::Scheme(url.scheme().to_string()));
        }

        let host = match url.host() {
            Some(Host::Domain(host)) => decode(host),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => String::new(),
        };
        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }
        if host.starts_with('-') {
            return Err(UrlError::OptionHost(host));
        }

        let user = match url.username() {
            "" => None,
            user => Some(decode(user)),
        };

        let mut request = Self {
            host,
            user,
            port: url.port(),
            ..Self::for_alias(String::new())
        };

        if let Some(query) = url.query() {
            // later pairs overwrite earlier ones
            for pair in query.split('&') {
                let Some((key, value)) = pair.split_once('=') else {
                    continue;
                };
                match key {
                    "account" => request.account = Some(decode(value)),
                    "terminal" => request.terminal = Some(decode(value)),
                    "reqver" => request.required_version = value.parse().unwrap_or(0),
                    _ => {}
                }
            }
        }

        Ok(request)
    }

    /// `user@host[:port]`, the form shown to people.
    pub fn target_host(&self) -> String {
        let mut target = String::new();
        if let Some(user) = &self.user {
            target.push_str(user);
            target.push('@');
        }
        if self.port.is_some() && self.host.contains(':') {
            target.push_str(&format!("[{}]", self.host));
        } else {
            target.push_str(&self.host);
        }
        if let Some(port) = self.port {
            target.push_str(&format!(":{}", port));
        }
        target
    }

    /// `host[ -p port]`, the form handed to `ssh`. The user is left to the ssh config.
    pub fn ssh_command_host(&self) -> String {
        match self.port {
            Some(port) => format!("{} -p {}", self.host, port),
            None => self.host.clone(),
        }
    }

    fn url_host(&self) -> String {
        // ipv6 literals go back in brackets
        if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            utf8_percent_encode(&self.host, USERINFO).to_string()
        }
    }

    pub fn to_url(&self) -> String {
        let mut url = format!("{}://", SCHEME);
        if let Some(user) = &self.user {
            url.push_str(&utf8_percent_encode(user, USERINFO).to_string());
            url.push('@');
        }
        url.push_str(&self.url_host());
        if let Some(port) = self.port {
            url.push_str(&format!(":{}", port));
        }

        let mut query = Vec::new();
        if let Some(account) = &self.account {
            query.push(format!("account={}", utf8_percent_encode(account, QUERY_VALUE)));
        }
        if let Some(terminal) = &self.terminal {
            query.push(format!("terminal={}", utf8_percent_encode(terminal, QUERY_VALUE)));
        }
        if self.required_version != 0 {
            query.push(format!("reqver={}", self.required_version));
        }
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        url
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
