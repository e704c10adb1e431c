use std::collections::HashSet;
use std::sync::RwLock;

use mcptrust_model::Lockfile;
use regex::Regex;

use crate::error::EnforcerError;
use crate::template::compile_template;

/// Allow/deny answers compiled once from a v3 lockfile and held immutable
/// for the life of the proxy process, except for a single one-shot
/// `set_static_resources` call after preflight (§3 lifecycle, §9 concurrency
/// model). The allowlists themselves never change after construction, so
/// lookups take no lock; only the static-resources set, touched exactly
/// once outside the steady-state bridge loop, is behind a lock.
pub struct Enforcer {
    tools: HashSet<String>,
    prompts: HashSet<String>,
    templates: Vec<Regex>,
    template_strings: HashSet<String>,
    static_resources: RwLock<HashSet<String>>,
}

impl Enforcer {
    /// Compiles all allowlists and URI-template matchers once from `lockfile`.
    pub fn from_lockfile(lockfile: &Lockfile) -> Result<Self, EnforcerError> {
        let tools = lockfile.tools.keys().cloned().collect();
        let prompts = lockfile.prompts.definitions.keys().cloned().collect();
        let templates = lockfile
            .resources
            .templates
            .iter()
            .map(|template| compile_template(&template.uri_template))
            .collect::<Result<Vec<_>, _>>()?;
        let template_strings = lockfile
            .resources
            .templates
            .iter()
            .map(|template| template.uri_template.clone())
            .collect();

        Ok(Self {
            tools,
            prompts,
            templates,
            template_strings,
            static_resources: RwLock::new(HashSet::new()),
        })
    }

    #[must_use]
    pub fn allow_tool(&self, name: &str) -> bool {
        self.tools.contains(name)
    }

    #[must_use]
    pub fn allow_prompt(&self, name: &str) -> bool {
        self.prompts.contains(name)
    }

    /// Matches `uri` against the compiled template set, falling back to the
    /// literal set captured by `set_static_resources` when enabled.
    #[must_use]
    pub fn allow_resource_uri(&self, uri: &str) -> bool {
        if self.templates.iter().any(|re| re.is_match(uri)) {
            return true;
        }
        self.static_resources
            .read()
            .expect("static resources lock poisoned")
            .contains(uri)
    }

    /// Whether `uri_template` (verbatim, not a concrete URI) is one of the
    /// templates compiled from the lockfile. Used to filter
    /// `resources/templates/list` responses, as distinct from
    /// [`Self::allow_resource_uri`] which matches concrete URIs.
    #[must_use]
    pub fn allow_template(&self, uri_template: &str) -> bool {
        self.template_strings.contains(uri_template)
    }

    /// Installs the literal resource URIs captured during preflight. Called
    /// at most once, before bridging begins (§9).
    pub fn set_static_resources(&self, uris: impl IntoIterator<Item = String>) {
        let mut guard = self.static_resources.write().expect("static resources lock poisoned");
        guard.extend(uris);
    }
}
