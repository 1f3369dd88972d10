use std::collections::HashSet;
use std::hash::Hash;

use super::{types::Config, ConfigError};
use crate::render::Template;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Worker intervals and limits are positive
/// - Ids are unique within each table
/// - Library roots are absolute
/// - Name templates are non-empty and parse
/// - At most one default per protocol (downloaders) or media type (libraries, templates)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let workers = &config.workers;
    if workers.job_poll_interval_ms == 0 || workers.import_poll_interval_ms == 0 {
        return Err(invalid("worker poll intervals must be positive"));
    }
    if workers.job_claim_limit == 0 || workers.import_claim_limit == 0 {
        return Err(invalid("worker claim limits must be positive"));
    }
    if workers.job_lease_secs == 0 {
        return Err(invalid("workers.job_lease_secs must be positive"));
    }
    if config.candidates.ttl_secs == 0 {
        return Err(invalid("candidates.ttl_secs must be positive"));
    }

    unique("downloaders", config.downloaders.iter().map(|d| d.id.as_str()))?;
    unique("libraries", config.libraries.iter().map(|l| l.id.as_str()))?;
    unique(
        "name_templates",
        config.name_templates.iter().map(|t| t.id.as_str()),
    )?;

    for d in &config.downloaders {
        if d.id.trim().is_empty() {
            return Err(invalid("downloader id cannot be empty"));
        }
        if d.url.trim().is_empty() {
            return Err(invalid(format!("downloader '{}' has no url", d.id)));
        }
    }

    for l in &config.libraries {
        if !l.root_path.is_absolute() {
            return Err(invalid(format!(
                "library '{}' root_path must be absolute: {}",
                l.id,
                l.root_path.display()
            )));
        }
    }

    for t in &config.name_templates {
        if t.template.trim().is_empty() {
            return Err(invalid(format!("name template '{}' is empty", t.id)));
        }
        Template::parse(&t.path_template())
            .map_err(|e| invalid(format!("name template '{}': {}", t.id, e)))?;
    }

    single_default(
        "downloader",
        config.downloaders.iter().filter(|d| d.default).map(|d| d.protocol),
    )?;
    single_default(
        "library",
        config.libraries.iter().filter(|l| l.default).map(|l| l.media_type),
    )?;
    single_default(
        "name template",
        config
            .name_templates
            .iter()
            .filter(|t| t.default)
            .map(|t| t.media_type),
    )?;

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn unique<'a>(table: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(invalid(format!("duplicate id '{}' in {}", id, table)));
        }
    }
    Ok(())
}

fn single_default<K>(kind: &str, keys: impl Iterator<Item = K>) -> Result<(), ConfigError>
where
    K: Eq + Hash + std::fmt::Display,
{
    let mut seen = HashSet::new();
    for key in keys {
        let label = key.to_string();
        if !seen.insert(key) {
            return Err(invalid(format!("more than one default {} for {}", kind, label)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn parse(toml: &str) -> Config {
        load_config_from_str(toml).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = parse(
            r#"
[[libraries]]
id = "movies"
media_type = "movie"
root_path = "/media/movies"
default = true

[[name_templates]]
id = "plain"
media_type = "movie"
movie_dir_template = "{{ media.clean_title }} ({{ media.year }})"
template = "{{ media.clean_title }} ({{ media.year }}) [{{ quality.full }}]"
default = true
"#,
        );
        assert!(validate_config(&config).is_ok());
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = parse("[server]\nport = 0\n");
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_interval_fails() {
        let config = parse("[workers]\njob_poll_interval_ms = 0\n");
        assert!(validate_config(&config).is_err());
        let config = parse("[workers]\nimport_claim_limit = 0\n");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_relative_library_root_fails() {
        let config = parse(
            r#"
[[libraries]]
id = "movies"
media_type = "movie"
root_path = "media/movies"
"#,
        );
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("absolute"));
    }

    #[test]
    fn test_validate_duplicate_ids_fail() {
        let config = parse(
            r#"
[[libraries]]
id = "movies"
media_type = "movie"
root_path = "/a"

[[libraries]]
id = "movies"
media_type = "series"
root_path = "/b"
"#,
        );
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate id 'movies'"));
    }

    #[test]
    fn test_validate_two_defaults_for_same_media_type_fail() {
        let config = parse(
            r#"
[[libraries]]
id = "a"
media_type = "movie"
root_path = "/a"
default = true

[[libraries]]
id = "b"
media_type = "movie"
root_path = "/b"
default = true
"#,
        );
        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("more than one default library for movie"));
    }

    #[test]
    fn test_validate_bad_template_fails() {
        let config = parse(
            r#"
[[name_templates]]
id = "broken"
media_type = "movie"
template = "{{ media.title "
"#,
        );
        assert!(validate_config(&config).is_err());

        let config = parse(
            r#"
[[name_templates]]
id = "unknown"
media_type = "movie"
template = "{{ media.nope }}"
"#,
        );
        assert!(validate_config(&config).is_err());
    }
}
