pub mod registry;

use async_trait::async_trait;
use figment::providers::{Env, Format, Yaml};
use registry::Registry;
use serde::de::DeserializeOwned;

/// A type that can be constructed asynchronously from its configuration.
/// Constructed values that other components depend on should register
/// themselves in the passed [`Registry`] so wiring stays explicit.
#[async_trait]
pub trait Configurable<C, E> {
    async fn try_from_config(config: &C, registry: &Registry) -> Result<Self, E>
    where
        Self: Sized;
}

/// Load a config struct from a YAML file merged with environment variables.
/// Env vars use the given prefix; `__` maps to `.` for nested keys, e.g.
/// `CORAL_POSTGRES__HOST` sets `postgres.host`.
pub fn load_config<T: DeserializeOwned>(
    path: &str,
    env_prefix: &str,
) -> Result<T, figment::Error> {
    // figment doesn't support env vars with underscores in nested keys,
    // so we map and replace them (same scheme the env prefix excludes).
    let mut f =
        figment::Figment::from(Env::prefixed(env_prefix).map(|k| k.as_str().replace("__", ".").into()));
    if std::path::Path::new(path).exists() {
        f = figment::Figment::from(Yaml::file(path)).merge(f);
    }
    f.extract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct TestConfig {
        listen_port: u16,
        postgres: TestPostgres,
    }

    #[derive(Deserialize, Debug)]
    struct TestPostgres {
        host: String,
    }

    #[test]
    fn test_yaml_with_env_override() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.yaml",
                r#"
listen_port: 8080
postgres:
  host: "localhost"
"#,
            )?;
            jail.set_env("CORAL_POSTGRES__HOST", "db.internal");
            let config: TestConfig =
                load_config("config.yaml", "CORAL_").expect("config should load");
            assert_eq!(config.listen_port, 8080);
            assert_eq!(config.postgres.host, "db.internal");
            Ok(())
        });
    }
}
