use std::fmt;

/// Name of one generation of cached assets: `<app-name>-<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheNamespace {
    app_name: String,
    version: String,
}

impl CacheNamespace {
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self) -> String {
        format!("{}-{}", self.app_name, self.version)
    }

    /// True for `name` of any generation of this app, this one included.
    pub fn is_sibling(&self, name: &str) -> bool {
        name.strip_prefix(&self.app_name)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|version| !version.is_empty())
    }

    /// True when `name` is an older or otherwise non-current generation.
    pub fn is_stale(&self, name: &str) -> bool {
        self.is_sibling(name) && name != self.name()
    }
}

impl fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.app_name, self.version)
    }
}
