//! Manifest (`converge.toml`) and connection settings

use anyhow::{Context, Result};
use reconciler::{Address, AttributeBag, ResourceKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const ENV_HOST: &str = "MSSQL_HOST";
pub const ENV_USER: &str = "MSSQL_USER";
pub const ENV_PASSWORD: &str = "MSSQL_PASSWORD";
pub const ENV_PORT: &str = "MSSQL_PORT";
pub const ENV_DATABASE: &str = "MSSQL_DEFAULT_DB";

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_DATABASE: &str = "master";

/// `[server]` table; every field may instead come from the environment
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default)]
    pub trust_cert: bool,
}

/// Fully resolved connection settings
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub trust_cert: bool,
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("trust_cert", &self.trust_cert)
            .finish()
    }
}

impl ServerConfig {
    /// Resolve against the process environment
    pub fn resolve(&self) -> Result<ConnectionSettings> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve with a custom environment lookup; manifest values win
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> Result<ConnectionSettings> {
        let pick = |value: &Option<String>, name: &str| {
            value
                .clone()
                .or_else(|| env(name))
                .filter(|v| !v.is_empty())
        };

        let host = pick(&self.host, ENV_HOST);
        let user = pick(&self.user, ENV_USER);
        let password = pick(&self.password, ENV_PASSWORD);

        let missing: Vec<&str> = [
            (host.is_none(), "host (MSSQL_HOST)"),
            (user.is_none(), "user (MSSQL_USER)"),
            (password.is_none(), "password (MSSQL_PASSWORD)"),
        ]
        .into_iter()
        .filter_map(|(absent, name)| absent.then_some(name))
        .collect();
        if !missing.is_empty() {
            anyhow::bail!("Missing connection settings: {}", missing.join(", "));
        }

        let port = match self.port {
            Some(port) => port,
            None => match env(ENV_PORT).filter(|v| !v.is_empty()) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("{ENV_PORT} is not a valid port: '{raw}'"))?,
                None => DEFAULT_PORT,
            },
        };

        Ok(ConnectionSettings {
            host: host.unwrap_or_default(),
            port,
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
            database: pick(&self.database, ENV_DATABASE)
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            trust_cert: self.trust_cert,
        })
    }
}

/// Declared desired state
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub databases: BTreeMap<String, AttributeBag>,
    #[serde(default)]
    pub logins: BTreeMap<String, AttributeBag>,
    #[serde(default)]
    pub users: BTreeMap<String, AttributeBag>,
    #[serde(default)]
    pub roles: BTreeMap<String, AttributeBag>,
    #[serde(default)]
    pub role_assignments: BTreeMap<String, AttributeBag>,
}

impl Manifest {
    /// Load the manifest from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))?;
        log::debug!("Loaded manifest from {}", path.display());
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Every declared resource keyed by address
    pub fn declared(&self) -> BTreeMap<Address, AttributeBag> {
        let tables = [
            (ResourceKind::Database, &self.databases),
            (ResourceKind::Login, &self.logins),
            (ResourceKind::User, &self.users),
            (ResourceKind::Role, &self.roles),
            (ResourceKind::RoleAssignment, &self.role_assignments),
        ];
        tables
            .into_iter()
            .flat_map(|(kind, table)| {
                table
                    .iter()
                    .map(move |(label, bag)| (Address::new(kind, label.as_str()), bag.clone()))
            })
            .collect()
    }

    /// Problems found without contacting the server
    ///
    /// Attribute errors of each resource, and two labels that resolve to the
    /// same server object.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let mut seen: BTreeMap<(ResourceKind, String), Address> = BTreeMap::new();

        for (address, bag) in self.declared() {
            let diagnostics = reconciler::validate(address.kind, &bag);
            problems.extend(
                diagnostics
                    .errors()
                    .map(|d| format!("{address}: {}", d.detail)),
            );
            if diagnostics.has_error() {
                continue;
            }

            if let Ok(id) = reconciler::identify(address.kind, &bag) {
                let key = (address.kind, id.to_string());
                if let Some(first) = seen.get(&key) {
                    problems.push(format!(
                        "{address}: declares the same {} '{id}' as {first}",
                        address.kind
                    ));
                } else {
                    seen.insert(key, address);
                }
            }
        }

        problems
    }
}
