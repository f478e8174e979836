//! # HTTP Digest Authentication
//!
//! Challenge parsing and `Authorization` header construction for the device management API
//! (RFC 2617, with the RFC 7616 SHA-256 algorithms).
//!
//! Two response paths exist:
//! * **qop=auth**: `H(HA1:nonce:nc:cnonce:qop:HA2)`, the path every current device offers.
//! * **legacy** (RFC 2069, no qop): `H(HA1:nonce:HA2)`, taken only when the server omits `qop`.
//!
//! A [`DigestClient`] owns the challenge currently in use for one device. The nonce counter
//! increments on every authorized request and restarts when the server issues a new nonce.

use md5::Md5;
use rand::Rng;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("no digest challenge was offered")]
    MissingChallenge,

    #[error("malformed digest challenge: {0}")]
    MalformedChallenge(String),

    #[error("unsupported digest algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("unsupported quality of protection '{0}'")]
    UnsupportedQop(String),
}

/// Hash function named by the `algorithm` challenge parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl Algorithm {
    fn parse(token: &str) -> Result<Self, DigestError> {
        match token.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "MD5-SESS" => Ok(Self::Md5Sess),
            "SHA-256" => Ok(Self::Sha256),
            "SHA-256-SESS" => Ok(Self::Sha256Sess),
            _ => Err(DigestError::UnsupportedAlgorithm(token.to_string())),
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    fn is_session(&self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }

    fn hash(&self, input: &str) -> String {
        match self {
            Self::Md5 | Self::Md5Sess => hex::encode(Md5::digest(input.as_bytes())),
            Self::Sha256 | Self::Sha256Sess => hex::encode(Sha256::digest(input.as_bytes())),
        }
    }
}

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub algorithm: Algorithm,
    /// Whether the server named the algorithm. Only then is it echoed back.
    pub algorithm_named: bool,
    /// Offered qop tokens, lowercased. `None` when the server sent no `qop` parameter.
    pub qop: Option<Vec<String>>,
    pub stale: bool,
}

/// The response computation selected for a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// `qop=auth` with client nonce and nonce counter.
    Auth,
    /// RFC 2069 compatibility: no qop, no cnonce, no nc.
    Legacy,
}

impl Challenge {
    /// Parses one `WWW-Authenticate` header value, which may list several schemes.
    pub fn parse(header: &str) -> Result<Self, DigestError> {
        let (_, params) = split_challenges(header)
            .into_iter()
            .find(|(scheme, _)| scheme.eq_ignore_ascii_case("digest"))
            .ok_or(DigestError::MissingChallenge)?;

        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let nonce = lookup("nonce")
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DigestError::MalformedChallenge("missing nonce".into()))?;
        let realm = lookup("realm")
            .ok_or_else(|| DigestError::MalformedChallenge("missing realm".into()))?;
        let named = lookup("algorithm");
        let algorithm = match &named {
            Some(token) => Algorithm::parse(token)?,
            None => Algorithm::Md5,
        };
        let qop = lookup("qop").map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect::<Vec<String>>()
        });
        let stale = lookup("stale").is_some_and(|s| s.eq_ignore_ascii_case("true"));

        Ok(Self {
            realm,
            nonce,
            opaque: lookup("opaque"),
            algorithm,
            algorithm_named: named.is_some(),
            qop,
            stale,
        })
    }

    /// Picks the Digest challenge out of every `WWW-Authenticate` header of a response.
    pub fn from_headers<'a, I>(values: I) -> Result<Self, DigestError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut first_error: Option<DigestError> = None;
        for value in values {
            match Self::parse(value) {
                Ok(challenge) => return Ok(challenge),
                Err(DigestError::MissingChallenge) => continue,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(DigestError::MissingChallenge))
    }

    /// Decides which response path this challenge requires.
    pub fn protection(&self) -> Result<Protection, DigestError> {
        match &self.qop {
            None => Ok(Protection::Legacy),
            Some(offered) if offered.iter().any(|q| q == "auth") => Ok(Protection::Auth),
            Some(offered) => Err(DigestError::UnsupportedQop(offered.join(","))),
        }
    }
}

/// Inputs of a single digest response computation.
#[derive(Debug, Clone, Copy)]
pub struct ResponseInput<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub method: &'a str,
    pub uri: &'a str,
    pub cnonce: &'a str,
    pub nonce_count: u32,
}

/// Computes the `response` value for `challenge`.
pub fn compute_response(
    challenge: &Challenge,
    protection: Protection,
    input: &ResponseInput<'_>,
) -> String {
    let alg = challenge.algorithm;
    let mut ha1 = alg.hash(&format!(
        "{}:{}:{}",
        input.username, challenge.realm, input.password
    ));
    if alg.is_session() {
        ha1 = alg.hash(&format!("{}:{}:{}", ha1, challenge.nonce, input.cnonce));
    }
    let ha2 = alg.hash(&format!("{}:{}", input.method, input.uri));

    match protection {
        Protection::Auth => alg.hash(&format!(
            "{}:{}:{:08x}:{}:auth:{}",
            ha1, challenge.nonce, input.nonce_count, input.cnonce, ha2
        )),
        Protection::Legacy => alg.hash(&format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
    }
}

/// Per-device digest state: the active challenge and its nonce counter.
#[derive(Debug, Clone, Default)]
pub struct DigestClient {
    challenge: Option<Challenge>,
    nonce_count: u32,
}

impl DigestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub fn has_challenge(&self) -> bool {
        self.challenge.is_some()
    }

    /// Number of requests authorized against the current nonce.
    pub fn nonce_count(&self) -> u32 {
        self.nonce_count
    }

    /// Installs a challenge received in a 401. The counter restarts only when the nonce changes.
    pub fn accept(&mut self, challenge: Challenge) {
        let same_nonce = self
            .challenge
            .as_ref()
            .is_some_and(|c| c.nonce == challenge.nonce && c.realm == challenge.realm);
        if !same_nonce {
            self.nonce_count = 0;
        }
        self.challenge = Some(challenge);
    }

    /// Forgets the active challenge.
    pub fn reset(&mut self) {
        self.challenge = None;
        self.nonce_count = 0;
    }

    /// Builds an `Authorization` header value with a fresh client nonce.
    pub fn authorize(
        &mut self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
    ) -> Result<String, DigestError> {
        let cnonce = generate_cnonce();
        self.authorize_with_cnonce(method, uri, username, password, &cnonce)
    }

    /// Same as [`authorize`](Self::authorize) with a caller-supplied client nonce.
    pub fn authorize_with_cnonce(
        &mut self,
        method: &str,
        uri: &str,
        username: &str,
        password: &str,
        cnonce: &str,
    ) -> Result<String, DigestError> {
        let challenge = self.challenge.as_ref().ok_or(DigestError::MissingChallenge)?;
        let protection = challenge.protection()?;

        self.nonce_count = self.nonce_count.wrapping_add(1);
        let input = ResponseInput {
            username,
            password,
            method,
            uri,
            cnonce,
            nonce_count: self.nonce_count,
        };
        let response = compute_response(challenge, protection, &input);

        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            escape(username),
            escape(&challenge.realm),
            escape(&challenge.nonce),
            escape(uri),
            response
        );
        if challenge.algorithm_named {
            header.push_str(&format!(", algorithm={}", challenge.algorithm.token()));
        }
        if protection == Protection::Auth {
            header.push_str(&format!(
                ", qop=auth, nc={:08x}, cnonce=\"{}\"",
                self.nonce_count,
                escape(cnonce)
            ));
        }
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{}\"", escape(opaque)));
        }
        Ok(header)
    }
}

fn generate_cnonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
    else {
        return trimmed.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on `sep` outside of quoted strings.
fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                parts.push(&input[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

type Params = Vec<(String, String)>;

/// Groups `auth-param`s under the scheme that precedes them.
fn split_challenges(header: &str) -> Vec<(String, Params)> {
    let mut challenges: Vec<(String, Params)> = Vec::new();

    for item in split_top_level(header, ',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }

        let rest = match item.split_once(char::is_whitespace) {
            Some((head, rest)) if !head.contains('=') => {
                challenges.push((head.to_string(), Vec::new()));
                rest.trim()
            }
            None if !item.contains('=') => {
                challenges.push((item.to_string(), Vec::new()));
                ""
            }
            _ => item,
        };

        if let (Some((key, value)), Some((_, params))) = (rest.split_once('='), challenges.last_mut()) {
            params.push((key.trim().to_ascii_lowercase(), unquote(value)));
        }
    }

    challenges
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
