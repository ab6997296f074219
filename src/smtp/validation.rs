//! Per-command argument validation.
//!
//! Each SMTP command has a schema converting the raw argument string into a
//! typed value or failing with a message the session surfaces as
//! `501 <message>`. Arity is strict: extra positional arguments are
//! rejected, and `MAIL FROM` extension parameters are only parsed when the
//! session speaks ESMTP.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

type Result<T> = std::result::Result<T, ValidationError>;

fn invalid(message: impl Into<String>) -> ValidationError {
    ValidationError(message.into())
}

/// Schema for commands that take no argument (NOOP, QUIT, RSET, DATA).
pub(crate) fn validate_no_arguments(input: &str) -> Result<()> {
    let extra = input.split_whitespace().collect::<Vec<_>>();
    if extra.is_empty() {
        Ok(())
    } else {
        Err(invalid(format!(
            "Syntactically invalid argument(s) '{}'",
            extra.join(" ")
        )))
    }
}

/// HELO/EHLO: exactly one whitespace-free token. No hostname grammar is
/// enforced, real clients send literals like `[127.0.0.1]`.
pub(crate) fn validate_helo(input: &str) -> Result<String> {
    let mut tokens = input.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(helo), None) => Ok(helo.to_string()),
        (None, _) => Err(invalid("Value must not be empty.")),
        (Some(_), Some(_)) => Err(invalid(format!(
            "Syntactically invalid argument(s) '{input}'",
            input = input.trim()
        ))),
    }
}

/// `local@domain` or `<local@domain>`; `<>` only where the null reverse
/// path is legal (the sender).
fn validate_email_address(raw: &str, allow_null_sender: bool) -> Result<String> {
    if raw.starts_with('<') || raw.ends_with('>') {
        let inner = raw
            .strip_prefix('<')
            .and_then(|rest| rest.strip_suffix('>'))
            .ok_or_else(|| {
                invalid("Invalid email address format - use balanced angle brackets.")
            })?;
        if inner.is_empty() {
            return if allow_null_sender {
                Ok(String::default())
            } else {
                Err(invalid(
                    "Invalid email address format - use balanced angle brackets.",
                ))
            };
        }
        validate_bare_address(inner)
    } else {
        validate_bare_address(raw)
    }
}

fn validate_bare_address(address: &str) -> Result<String> {
    let well_formed = matches!(
        address.split_once('@'),
        Some((local, domain))
            if !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address.contains(['<', '>'])
                && !address.chars().any(char::is_whitespace)
    );

    if well_formed {
        Ok(address.to_string())
    } else {
        Err(invalid(format!("Invalid email address \"{address}\"")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MailFromArguments {
    pub email: String,
    pub size: Option<usize>,
    /// The raw `KEY=VALUE` pairs as sent, keys lower-cased.
    pub extensions: HashMap<String, String>,
}

/// MAIL FROM: the reverse path, followed by optional `KEY=VALUE` extension
/// parameters which are only legal on ESMTP sessions.
pub(crate) fn validate_mail_from(input: &str, esmtp: bool) -> Result<MailFromArguments> {
    let tokens = input.split_whitespace().collect::<Vec<_>>();
    let Some((email, options)) = tokens.split_first() else {
        return Err(invalid("Value must not be empty."));
    };

    // Option tokens are checked for shape and known keys before the esmtp
    // gate: a malformed or unknown extension is reported as such even on a
    // plain SMTP session.
    let raw_options = options.join(" ");
    if options.iter().any(|option| !option.contains('=')) {
        return Err(invalid(format!("Invalid arguments: \"{raw_options}\"")));
    }

    let mut extensions = HashMap::new();
    for option in options.iter().copied() {
        let (key, value) = option.split_once('=').unwrap_or((option, ""));
        let key = key.to_ascii_lowercase();
        if key != "size" {
            return Err(invalid(format!("Invalid extension: \"{raw_options}\"")));
        }
        extensions.insert(key, value.to_string());
    }

    if !extensions.is_empty() && !esmtp {
        return Err(invalid("No SMTP extensions allowed for plain SMTP."));
    }

    let size = extensions
        .get("size")
        .map(|value| validate_size(value))
        .transpose()?;

    Ok(MailFromArguments {
        email: validate_email_address(email, true)?,
        size,
        extensions,
    })
}

fn validate_size(value: &str) -> Result<usize> {
    let size: i64 = value
        .parse()
        .map_err(|_| invalid("Invalid size: Please enter a number."))?;
    if size < 1 {
        return Err(invalid("Invalid size: Must be 1 or greater."));
    }
    usize::try_from(size).map_err(|_| invalid("Invalid size: Please enter a number."))
}

/// RCPT TO: a single email address, no extensions.
pub(crate) fn validate_rcpt_to(input: &str) -> Result<String> {
    let mut tokens = input.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(email), None) => validate_email_address(email, false),
        (None, _) => Err(invalid("Value must not be empty.")),
        (Some(_), Some(extra)) => {
            let mut extras = vec![extra];
            extras.extend(tokens);
            Err(invalid(format!(
                "Syntactically invalid argument(s) '{}'",
                extras.join(" ")
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuthPlainCredentials {
    pub authzid: Option<String>,
    pub username: String,
    pub password: String,
}

/// AUTH PLAIN: one base64 token decoding to `authzid \0 authcid \0 passwd`
/// (RFC 4616). An empty authzid becomes `None`.
pub(crate) fn validate_auth_plain(input: &str) -> Result<AuthPlainCredentials> {
    let mut tokens = input.split_whitespace();
    let token = match (tokens.next(), tokens.next()) {
        (Some(token), None) => token,
        (None, _) => return Err(invalid("Value must not be empty.")),
        (Some(_), Some(extra)) => {
            return Err(invalid(format!(
                "Syntactically invalid argument(s) '{extra}'"
            )));
        }
    };

    let decoded = decode_credential(token)?;
    let mut fields = decoded.split('\0');
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some(authzid), Some(username), Some(password), None) => Ok(AuthPlainCredentials {
            authzid: (!authzid.is_empty()).then(|| authzid.to_string()),
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(invalid("Garbled data sent")),
    }
}

/// AUTH LOGIN: zero or one argument; when present it is the base64-encoded
/// username (the "initial response" short form).
pub(crate) fn validate_auth_login(input: &str) -> Result<Option<String>> {
    let mut tokens = input.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (None, _) => Ok(None),
        (Some(token), None) => decode_credential(token).map(Some),
        (Some(_), Some(extra)) => Err(invalid(format!(
            "Syntactically invalid argument(s) '{extra}'"
        ))),
    }
}

/// Decode one base64 credential line (AUTH LOGIN username/password step, or
/// the AUTH PLAIN token).
pub(crate) fn decode_credential(token: &str) -> Result<String> {
    BASE64
        .decode(token.trim())
        .ok()
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .ok_or_else(|| invalid("Garbled data sent"))
}
