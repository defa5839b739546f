//! `${VAR}` and `${VAR:-default}` expansion in the URL-like fields of a
//! loaded [`Config`].
//!
//! Only the link prefix, the link suffix and interwiki base URLs are expanded.
//! A value without `${` is left alone, so a literal `$` needs no escaping.

use std::env::VarError;

use shellexpand::LookupError;

use crate::{Config, ConfigError};

/// Expand environment references in every expandable field of `config`.
pub(crate) fn expand_env_vars(config: &mut Config) -> Result<(), ConfigError> {
    if let Some(prefix) = config.format.link_prefix.as_mut() {
        expand_field(prefix, "format.link_prefix")?;
    }
    if let Some(suffix) = config.format.link_suffix.as_mut() {
        expand_field(suffix, "format.link_suffix")?;
    }
    for (name, url) in &mut config.interwiki {
        expand_field(url, &format!("interwiki.{name}"))?;
    }
    Ok(())
}

/// Expand `value` in place. `field` names it in errors.
fn expand_field(value: &mut String, field: &str) -> Result<(), ConfigError> {
    if !value.contains("${") {
        return Ok(());
    }
    let expanded = shellexpand::env_with_context(value.as_str(), |var| {
        std::env::var(var).map(Some)
    })
    .map_err(|err| lookup_error(field, &err))?;
    *value = expanded.into_owned();
    Ok(())
}

fn lookup_error(field: &str, err: &LookupError<VarError>) -> ConfigError {
    let reason = match err.cause {
        VarError::NotPresent => "is not set",
        VarError::NotUnicode(_) => "is not valid unicode",
    };
    ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{}}} {reason}", err.var_name),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_expand_field_in_place() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("CREOLE_EXPAND_HOST", "wiki.example.com");
        }
        let mut value = "https://${CREOLE_EXPAND_HOST}/page/".to_owned();
        expand_field(&mut value, "interwiki.Home").unwrap();
        assert_eq!(value, "https://wiki.example.com/page/");
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CREOLE_EXPAND_HOST");
        }
    }

    #[test]
    fn test_expand_field_default_when_unset() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CREOLE_EXPAND_UNSET");
        }
        let mut value = "${CREOLE_EXPAND_UNSET:-.html}".to_owned();
        expand_field(&mut value, "format.link_suffix").unwrap();
        assert_eq!(value, ".html");
    }

    #[test]
    fn test_expand_field_without_braces_is_literal() {
        let mut value = "/wiki/$page".to_owned();
        expand_field(&mut value, "format.link_prefix").unwrap();
        assert_eq!(value, "/wiki/$page");
    }

    #[test]
    fn test_missing_var_names_field() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CREOLE_EXPAND_MISSING");
        }
        let mut value = "${CREOLE_EXPAND_MISSING}/".to_owned();
        let err = expand_field(&mut value, "interwiki.Docs").unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(message.contains("interwiki.Docs"));
        assert!(message.contains("${CREOLE_EXPAND_MISSING} is not set"));
        assert_eq!(value, "${CREOLE_EXPAND_MISSING}/");
    }

    #[test]
    fn test_expand_env_vars_covers_url_fields_only() {
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::set_var("CREOLE_EXPAND_BASE", "/docs");
        }
        let mut config = Config::default();
        config.format.link_prefix = Some("${CREOLE_EXPAND_BASE}/".to_owned());
        config.format.link_suffix = Some("${CREOLE_EXPAND_EXT:-.html}".to_owned());
        config.format.default_image_text = "${CREOLE_EXPAND_BASE}".to_owned();
        config
            .interwiki
            .insert("Local".to_owned(), "${CREOLE_EXPAND_BASE}/local/".to_owned());

        expand_env_vars(&mut config).unwrap();

        assert_eq!(config.format.link_prefix.as_deref(), Some("/docs/"));
        assert_eq!(config.format.link_suffix.as_deref(), Some(".html"));
        assert_eq!(config.format.default_image_text, "${CREOLE_EXPAND_BASE}");
        assert_eq!(config.interwiki["Local"], "/docs/local/");
        // SAFETY: variable name is unique to this test
        unsafe {
            std::env::remove_var("CREOLE_EXPAND_BASE");
        }
    }
}
