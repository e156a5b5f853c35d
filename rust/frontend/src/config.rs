use coral_postgres::PostgresDbConfig;
use serde::Deserialize;

const DEFAULT_CONFIG_PATH: &str = "./coral_config.yaml";

fn default_listen_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_cors_allow_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

#[derive(Clone, Debug, Deserialize)]
pub struct FrontendConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_cors_allow_origins")]
    pub cors_allow_origins: Vec<String>,
    #[serde(default)]
    pub postgres: PostgresDbConfig,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        FrontendConfig {
            listen_address: default_listen_address(),
            cors_allow_origins: default_cors_allow_origins(),
            postgres: PostgresDbConfig::default(),
        }
    }
}

impl FrontendConfig {
    pub fn load() -> Self {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from_path(path: &str) -> Self {
        match coral_config::load_config(path, "CORAL_") {
            Ok(config) => config,
            Err(e) => panic!("Error loading config: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_a_file() {
        figment::Jail::expect_with(|_jail| {
            let config = FrontendConfig::load_from_path("missing.yaml");
            assert_eq!(config.listen_address, "0.0.0.0:3000");
            assert_eq!(config.postgres.database, "coral_crm");
            Ok(())
        });
    }

    #[test]
    fn test_yaml_and_env_layering() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "coral_config.yaml",
                r#"
listen_address: "127.0.0.1:8100"
postgres:
  database: "coral_staging"
"#,
            )?;
            jail.set_env("CORAL_POSTGRES__MAX_CONNECTIONS", "25");
            let config = FrontendConfig::load_from_path("coral_config.yaml");
            assert_eq!(config.listen_address, "127.0.0.1:8100");
            assert_eq!(config.postgres.database, "coral_staging");
            assert_eq!(config.postgres.max_connections, 25);
            Ok(())
        });
    }
}
