//! Static per-kind resource metadata
//!
//! A [`Descriptor`] lists every attribute of a kind together with how a
//! change to it is handled. It is pure data; nothing here touches a server.

use crate::types::{AttrValue, ResourceKind};

/// How a change to an attribute can be applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Identity-forming, no rename command exists
    Identity,
    /// Identity-forming, changed with an explicit rename command
    Rename,
    /// Altered in place
    InPlace,
    /// Changing it requires delete + create
    Replace,
    /// Set by the engine or the server, never diffed
    ReadOnly,
}

impl UpdatePolicy {
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity | Self::Rename)
    }
}

/// Compile-time default value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
}

impl DefaultValue {
    pub fn to_value(self) -> AttrValue {
        match self {
            Self::Str(s) => AttrValue::Str(s.to_string()),
            Self::Int(n) => AttrValue::Int(n),
        }
    }
}

/// One attribute of a resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub required: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub default: Option<DefaultValue>,
    pub update: UpdatePolicy,
}

impl AttributeSpec {
    const fn new(name: &'static str, update: UpdatePolicy) -> Self {
        Self {
            name,
            required: false,
            computed: false,
            sensitive: false,
            default: None,
            update,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    const fn default(mut self, value: DefaultValue) -> Self {
        self.default = Some(value);
        self.computed = true;
        self
    }
}

/// Attribute holding the resource identifier, present on every kind
pub const ID: &str = "id";

const fn id() -> AttributeSpec {
    AttributeSpec::new(ID, UpdatePolicy::ReadOnly).computed()
}

/// Static metadata for one resource kind
#[derive(Debug)]
pub struct Descriptor {
    pub kind: ResourceKind,
    pub attributes: &'static [AttributeSpec],
}

impl Descriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attributes the identifier is derived from
    pub fn identity(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter().filter(|a| a.update.is_identity())
    }

    /// Attributes that can change without delete + create
    pub fn updatable(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes
            .iter()
            .filter(|a| matches!(a.update, UpdatePolicy::InPlace | UpdatePolicy::Rename))
    }

    pub fn required(&self) -> impl Iterator<Item = &AttributeSpec> {
        self.attributes.iter().filter(|a| a.required)
    }

    /// Whether any attribute has an in-place or rename path
    pub fn has_update_path(&self) -> bool {
        self.updatable().next().is_some()
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|a| a.sensitive)
    }
}

/// Default database collation
pub const DEFAULT_COLLATION: &str = "SQL_Latin1_General_CP1_CI_AS";

/// Default database compatibility level
pub const DEFAULT_COMPATIBILITY_LEVEL: i64 = 150;

/// Default database for new logins
pub const DEFAULT_LOGIN_DATABASE: &str = "master";

static DATABASE: Descriptor = Descriptor {
    kind: ResourceKind::Database,
    attributes: &[
        AttributeSpec::new("name", UpdatePolicy::Rename).required(),
        AttributeSpec::new("collation", UpdatePolicy::Replace)
            .default(DefaultValue::Str(DEFAULT_COLLATION)),
        AttributeSpec::new("compatibility_level", UpdatePolicy::Replace)
            .default(DefaultValue::Int(DEFAULT_COMPATIBILITY_LEVEL)),
        AttributeSpec::new("owner", UpdatePolicy::InPlace).computed(),
        id(),
    ],
};

static LOGIN: Descriptor = Descriptor {
    kind: ResourceKind::Login,
    attributes: &[
        AttributeSpec::new("name", UpdatePolicy::Rename).required(),
        AttributeSpec::new("password", UpdatePolicy::InPlace).sensitive(),
        AttributeSpec::new("type", UpdatePolicy::Replace).required(),
        AttributeSpec::new("default_database", UpdatePolicy::InPlace)
            .default(DefaultValue::Str(DEFAULT_LOGIN_DATABASE)),
        id(),
    ],
};

static USER: Descriptor = Descriptor {
    kind: ResourceKind::User,
    attributes: &[
        AttributeSpec::new("database", UpdatePolicy::Identity).required(),
        AttributeSpec::new("name", UpdatePolicy::Rename).required(),
        AttributeSpec::new("login", UpdatePolicy::Replace),
        id(),
    ],
};

static ROLE: Descriptor = Descriptor {
    kind: ResourceKind::Role,
    attributes: &[
        AttributeSpec::new("database", UpdatePolicy::Identity).required(),
        AttributeSpec::new("name", UpdatePolicy::Identity).required(),
        id(),
    ],
};

static ROLE_ASSIGNMENT: Descriptor = Descriptor {
    kind: ResourceKind::RoleAssignment,
    attributes: &[
        AttributeSpec::new("database", UpdatePolicy::Identity).required(),
        AttributeSpec::new("role", UpdatePolicy::Identity).required(),
        AttributeSpec::new("member", UpdatePolicy::Identity).required(),
        id(),
    ],
};

static SERVER_INFO: Descriptor = Descriptor {
    kind: ResourceKind::ServerInfo,
    attributes: &[
        AttributeSpec::new("version", UpdatePolicy::ReadOnly).computed(),
        id(),
    ],
};

/// Look up the descriptor for a kind
pub fn describe(kind: ResourceKind) -> &'static Descriptor {
    match kind {
        ResourceKind::Database => &DATABASE,
        ResourceKind::Login => &LOGIN,
        ResourceKind::User => &USER,
        ResourceKind::Role => &ROLE,
        ResourceKind::RoleAssignment => &ROLE_ASSIGNMENT,
        ResourceKind::ServerInfo => &SERVER_INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names<'a>(specs: impl Iterator<Item = &'a AttributeSpec>) -> Vec<&'static str> {
        specs.map(|a| a.name).collect()
    }

    #[test]
    fn test_identity_attributes() {
        assert_eq!(names(describe(ResourceKind::Database).identity()), ["name"]);
        assert_eq!(names(describe(ResourceKind::Login).identity()), ["name"]);
        assert_eq!(
            names(describe(ResourceKind::User).identity()),
            ["database", "name"]
        );
        assert_eq!(
            names(describe(ResourceKind::Role).identity()),
            ["database", "name"]
        );
        assert_eq!(
            names(describe(ResourceKind::RoleAssignment).identity()),
            ["database", "role", "member"]
        );
    }

    #[test]
    fn test_update_paths() {
        assert_eq!(
            names(describe(ResourceKind::Login).updatable()),
            ["name", "password", "default_database"]
        );
        assert_eq!(
            names(describe(ResourceKind::Database).updatable()),
            ["name", "owner"]
        );
        assert!(!describe(ResourceKind::Role).has_update_path());
        assert!(!describe(ResourceKind::RoleAssignment).has_update_path());
    }

    #[test]
    fn test_defaults_are_computed() {
        let db = describe(ResourceKind::Database);
        let collation = db.attribute("collation").unwrap();
        assert!(collation.computed);
        assert_eq!(
            collation.default.map(DefaultValue::to_value),
            Some(AttrValue::from(DEFAULT_COLLATION))
        );
        assert!(describe(ResourceKind::Login).is_sensitive("password"));
    }

    #[test]
    fn test_every_kind_has_computed_id() {
        for kind in ResourceKind::MANAGED {
            let id = describe(kind).attribute(ID).unwrap();
            assert!(id.computed);
            assert_eq!(id.update, UpdatePolicy::ReadOnly);
        }
    }
}
