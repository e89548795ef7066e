//! User search filter templates
//!
//! A template carries exactly one username placeholder, either `%s` or
//! `{username}`. The username is escaped per RFC 4515 before substitution so
//! it can never change the structure of the filter.

use ldap3::ldap_escape;
use std::fmt;

use crate::ldap::error::ConfigError;

/// Recognised placeholder tokens
pub const PLACEHOLDERS: [&str; 2] = ["%s", "{username}"];

/// A parsed filter template split around its single placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterTemplate {
    template: String,
    prefix: String,
    suffix: String,
}

impl FilterTemplate {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let mut found = PLACEHOLDERS
            .iter()
            .flat_map(|&token| template.match_indices(token).map(move |(i, _)| (i, token)));

        let first = found.next();
        let extra = found.count();

        match first {
            Some((index, token)) if extra == 0 => Ok(Self {
                template: template.to_string(),
                prefix: template[..index].to_string(),
                suffix: template[index + token.len()..].to_string(),
            }),
            _ => Err(ConfigError::FilterPlaceholder {
                template: template.to_string(),
                found: first.map_or(0, |_| extra + 1),
            }),
        }
    }

    /// Substitute the escaped username into the template
    pub fn render(&self, username: &str) -> String {
        format!("{}{}{}", self.prefix, ldap_escape(username), self.suffix)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for FilterTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}
