//! Worker credentials and their quoting inside scheduler directives.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of generated worker passwords.
pub const GENERATED_PASSWORD_LEN: usize = 32;

/// Generate a random alphanumeric worker password.
pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// Quote a value for an HTCondor `environment="..."` assignment.
///
/// Double quotes and single quotes are doubled, then the whole value is
/// wrapped in single quotes so whitespace and shell metacharacters stay
/// inside one token.
///
/// ```
/// use drover_latent::secret::escape_env_value;
///
/// assert_eq!(escape_env_value(r#"O'Brien says "hi""#), r#"'O''Brien says ""hi""'"#);
/// ```
pub fn escape_env_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\"\""),
            '\'' => out.push_str("''"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Reverse [`escape_env_value`].
///
/// Returns `None` unless `token` is a single-quoted value whose inner
/// quotes are all doubled.
pub fn unescape_env_value(token: &str) -> Option<String> {
    let inner = token.strip_prefix('\'')?.strip_suffix('\'')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' | '\'' => {
                if chars.next() != Some(c) {
                    return None;
                }
                out.push(c);
            }
            c => out.push(c),
        }
    }
    Some(out)
}
