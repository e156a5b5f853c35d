use crate::config::MigrationHash;
use core::str;
use coral_error::{CoralError, ErrorCodes};
use regex::Regex;
use rust_embed::Embed;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::{borrow::Cow, sync::LazyLock};
use thiserror::Error;

///////////// Migration Types //////////////

// A migration is a paired up/down SQL transformation applied to one schema.
// ## Fields
// - scope: which script set the migration belongs to ("registry" or "tenant")
// - version: ascending application order within the scope
// - name: the human-readable part of the filename, shared by both directions
// - up_sql / down_sql: the forward transformation and its exact reverse
// - hash: hash of up_sql and down_sql together; a changed script fails
//   validation against the applied log
#[derive(Clone, Debug)]
pub struct Migration {
    pub scope: String,
    pub version: i32,
    pub name: String,
    pub up_sql: String,
    pub down_sql: String,
    pub hash: String,
}

impl Migration {
    pub fn new(
        scope: String,
        version: i32,
        name: String,
        up_sql: String,
        down_sql: String,
        hash_type: &MigrationHash,
    ) -> Self {
        let hash = compute_hash(hash_type, &up_sql, &down_sql);
        Self {
            scope,
            version,
            name,
            up_sql,
            down_sql,
            hash,
        }
    }
}

fn compute_hash(hash_type: &MigrationHash, up_sql: &str, down_sql: &str) -> String {
    match hash_type {
        MigrationHash::SHA256 => {
            let mut hasher = Sha256::new();
            hasher.update(up_sql.as_bytes());
            hasher.update(down_sql.as_bytes());
            format!("{:x}", hasher.finalize())
        }
        MigrationHash::MD5 => {
            let mut context = md5::Context::new();
            context.consume(up_sql.as_bytes());
            context.consume(down_sql.as_bytes());
            format!("{:x}", context.compute())
        }
    }
}

// A migration scope is an independently versioned script set. The registry
// set targets the shared schema; the tenant set is applied once per tenant
// schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationScope {
    Registry,
    Tenant,
}

#[derive(Error, Debug)]
pub enum GetSourceMigrationsError {
    #[error(transparent)]
    ParseMigrationFilename(#[from] ParseMigrationFilenameError),
    #[error("Failed to read migration file: {0}")]
    FailedToReadMigrationFile(String),
    #[error("Migration [{0}] version {1} is missing its {2} script")]
    MissingDirection(String, i32, &'static str),
    #[error("Migration version {0} has conflicting names [{1}] and [{2}]")]
    ConflictingNames(i32, String, String),
}

impl CoralError for GetSourceMigrationsError {
    fn code(&self) -> ErrorCodes {
        ErrorCodes::Internal
    }
}

impl MigrationScope {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Registry => "registry",
            Self::Tenant => "tenant",
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Cow<'static, str>>> {
        match self {
            Self::Registry => Box::new(RegistryMigrationsFolder::iter()),
            Self::Tenant => Box::new(TenantMigrationsFolder::iter()),
        }
    }

    fn get_file(&self, name: &str) -> Option<rust_embed::EmbeddedFile> {
        match self {
            Self::Registry => RegistryMigrationsFolder::get(name),
            Self::Tenant => TenantMigrationsFolder::get(name),
        }
    }

    /// Pair up the embedded up/down files for this scope into [`Migration`]s,
    /// sorted by version in ascending order. A file without its counterpart
    /// is an error; the scripts ship in the binary so this only fires on a
    /// packaging mistake.
    pub fn get_source_migrations(
        &self,
        hash_type: &MigrationHash,
    ) -> Result<Vec<Migration>, GetSourceMigrationsError> {
        struct Pending {
            name: String,
            up_sql: Option<String>,
            down_sql: Option<String>,
        }
        let mut pending: BTreeMap<i32, Pending> = BTreeMap::new();

        for file_name in self.iter() {
            let (version, name, direction) = parse_migration_filename(&file_name)?;
            let sql = match self.get_file(&file_name) {
                Some(file) => str::from_utf8(&file.data)
                    .map_err(|_| {
                        GetSourceMigrationsError::FailedToReadMigrationFile(file_name.to_string())
                    })?
                    // Remove CR character on Windows
                    .replace('\r', ""),
                None => {
                    return Err(GetSourceMigrationsError::FailedToReadMigrationFile(
                        file_name.to_string(),
                    ))
                }
            };
            let entry = pending.entry(version).or_insert_with(|| Pending {
                name: name.clone(),
                up_sql: None,
                down_sql: None,
            });
            if entry.name != name {
                return Err(GetSourceMigrationsError::ConflictingNames(
                    version,
                    entry.name.clone(),
                    name,
                ));
            }
            match direction {
                MigrationDirection::Up => entry.up_sql = Some(sql),
                MigrationDirection::Down => entry.down_sql = Some(sql),
            }
        }

        let mut migrations = Vec::with_capacity(pending.len());
        for (version, entry) in pending {
            let up_sql = entry.up_sql.ok_or(GetSourceMigrationsError::MissingDirection(
                entry.name.clone(),
                version,
                "up",
            ))?;
            let down_sql = match entry.down_sql {
                Some(down_sql) => down_sql,
                None => {
                    return Err(GetSourceMigrationsError::MissingDirection(
                        entry.name, version, "down",
                    ))
                }
            };
            migrations.push(Migration::new(
                self.as_str().to_string(),
                version,
                entry.name,
                up_sql,
                down_sql,
                hash_type,
            ));
        }
        Ok(migrations)
    }
}

///////////// Filename Parsing //////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MigrationDirection {
    Up,
    Down,
}

#[derive(Error, Debug)]
pub enum ParseMigrationFilenameError {
    #[error("Invalid migration filename: {0}")]
    InvalidMigrationFilename(String),
}

// Format is <version>-<name>.<up|down>.sql
// e.g. 00002-conversations.up.sql
fn parse_migration_filename(
    filename: &str,
) -> Result<(i32, String, MigrationDirection), ParseMigrationFilenameError> {
    let groups = MIGRATION_FILENAME_REGEX
        .captures(filename)
        .ok_or_else(|| {
            ParseMigrationFilenameError::InvalidMigrationFilename(filename.to_string())
        })?;

    let version = groups
        .get(1)
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .ok_or_else(|| {
            ParseMigrationFilenameError::InvalidMigrationFilename(filename.to_string())
        })?;
    let name = groups
        .get(2)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            ParseMigrationFilenameError::InvalidMigrationFilename(filename.to_string())
        })?;
    let direction = match groups.get(3).map(|m| m.as_str()) {
        Some("up") => MigrationDirection::Up,
        Some("down") => MigrationDirection::Down,
        _ => {
            return Err(ParseMigrationFilenameError::InvalidMigrationFilename(
                filename.to_string(),
            ))
        }
    };

    Ok((version, name, direction))
}

static MIGRATION_FILENAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-(.+)\.(up|down)\.sql").expect("Failed to compile regex"));

///////////// Embedded Migration Data //////////////
// The migration files are embedded in the binary using the `rust_embed`
// crate. These are internal to this file and should not be used elsewhere.

#[derive(Embed)]
#[folder = "./migrations/registry/"]
#[include = "*.sql"]
struct RegistryMigrationsFolder;

#[derive(Embed)]
#[folder = "./migrations/tenant/"]
#[include = "*.sql"]
struct TenantMigrationsFolder;

//////////////////////// Tests ////////////////////////
