//! Script units and what compiling and loading them produces.

use std::path::{Path, PathBuf};

use scriptcache_hash::ContentHash;

use crate::classloader::RuntimeClass;

/// A unit of script source awaiting compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSource {
    template_id: String,
    source_hash: ContentHash,
    display_name: String,
}

impl ScriptSource {
    pub fn new(
        template_id: impl Into<String>,
        source_hash: ContentHash,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            template_id: template_id.into(),
            source_hash,
            display_name: display_name.into(),
        }
    }

    /// Builds a source whose hash is the digest of `text`.
    pub fn from_text(
        template_id: impl Into<String>,
        display_name: impl Into<String>,
        text: &str,
    ) -> Self {
        Self::new(template_id, ContentHash::of(text), display_name)
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn source_hash(&self) -> ContentHash {
        self.source_hash
    }

    /// Human readable name, only used in diagnostics.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Last path segment of the template id, e.g. `SettingsScript` for
    /// `build.scripts.SettingsScript` or `scripts::SettingsScript`.
    pub fn template_short_name(&self) -> &str {
        self.template_id
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(&self.template_id)
    }
}

/// Output of compiling a script: where the compiled classes live and which
/// class to load from there.
pub trait CompiledArtifact: Send + Sync + 'static {
    fn location(&self) -> &Path;
    fn class_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScript {
    location: PathBuf,
    class_name: String,
}

impl CompiledScript {
    pub fn new(location: impl Into<PathBuf>, class_name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            class_name: class_name.into(),
        }
    }
}

impl CompiledArtifact for CompiledScript {
    fn location(&self) -> &Path {
        &self.location
    }

    fn class_name(&self) -> &str {
        &self.class_name
    }
}

/// A compiled artifact together with the class resolved from it.
#[derive(Debug)]
pub struct LoadedScriptClass<A> {
    artifact: A,
    script_class: RuntimeClass,
}

impl<A: CompiledArtifact> LoadedScriptClass<A> {
    pub fn new(artifact: A, script_class: RuntimeClass) -> Self {
        Self {
            artifact,
            script_class,
        }
    }

    pub fn artifact(&self) -> &A {
        &self.artifact
    }

    pub fn script_class(&self) -> &RuntimeClass {
        &self.script_class
    }
}
