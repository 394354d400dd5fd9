//! Project descriptor parsing.
//!
//! Reads the dependency manifest of a project (`pom.xml`). Only a small
//! subset of the format is consumed:
//!
//! ```text
//! <project>
//!   <properties>
//!     <name>value</name>            -- flat name -> text table
//!   </properties>
//!   <dependencies>
//!     <dependency>
//!       <groupId>..</groupId>
//!       <artifactId>..</artifactId>
//!       <version>..</version>
//!       <scope>..</scope>          -- optional
//!       <type>..</type>            -- optional packaging, default jar
//!     </dependency>
//!   </dependencies>
//! </project>
//! ```
//!
//! Elements nested anywhere else (`dependencyManagement`, plugin
//! dependencies, profiles) are ignored.
//!
//! # Property substitution
//!
//! Each of `groupId`, `artifactId` and `version` is looked up *verbatim* as
//! a key in the property table and replaced by the mapped value when one
//! exists. `<version>lib.version</version>` picks up a property named
//! `lib.version`; `${lib.version}` is only substituted if a property is
//! literally named `${lib.version}`.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};
use crate::resolve::{DEFAULT_EXTENSION, DependencyCoordinate};

/// Which declared scopes are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeFilter {
    /// `compile`, `runtime` and undeclared scopes.
    #[default]
    Runtime,
    /// Everything `Runtime` keeps, plus `test`.
    RuntimeAndTest,
}

impl ScopeFilter {
    /// Whether a dependency with the given declared scope is kept.
    pub fn retains(self, scope: Option<&str>) -> bool {
        match scope {
            None | Some("compile") | Some("runtime") => true,
            Some("test") => self == ScopeFilter::RuntimeAndTest,
            Some(_) => false,
        }
    }
}

/// Parsed project descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectDescriptor {
    /// Property table; a repeated name keeps the last value.
    pub properties: HashMap<String, String>,

    /// Retained dependencies in declaration order.
    pub dependencies: Vec<DependencyCoordinate>,
}

impl ProjectDescriptor {
    /// Replace `raw` by the property it names, or keep it unchanged.
    pub fn substitute(&self, raw: &str) -> String {
        self.properties
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }
}

/// A `<dependency>` element as written, before filtering and substitution.
#[derive(Debug, Default)]
struct RawDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    packaging: Option<String>,
}

/// Parser for project descriptors.
pub struct ProjectDescriptorParser {
    filter: ScopeFilter,
}

impl ProjectDescriptorParser {
    /// Create a parser retaining compile/runtime/undeclared scopes.
    pub fn new() -> Self {
        Self {
            filter: ScopeFilter::Runtime,
        }
    }

    /// Create a parser with an explicit scope filter.
    pub fn with_filter(filter: ScopeFilter) -> Self {
        Self { filter }
    }

    /// Parse the descriptor file at `path`.
    pub fn parse(&self, path: &Path) -> Result<ProjectDescriptor> {
        let xml = std::fs::read_to_string(path)
            .map_err(|e| Error::Parse(format!("cannot read {}: {}", path.display(), e)))?;
        self.parse_str(&xml)
    }

    /// Parse descriptor XML from memory.
    pub fn parse_str(&self, xml: &str) -> Result<ProjectDescriptor> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut descriptor = ProjectDescriptor::default();
        let mut raw_deps: Vec<RawDependency> = Vec::new();
        let mut current: Option<RawDependency> = None;

        // Local names of the open elements, root first.
        let mut path: Vec<String> = Vec::new();
        let mut text = String::new();
        let mut saw_root = false;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::Parse(format!("at byte {}: {}", reader.error_position(), e))
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut path, &mut current, &mut saw_root, name);
                    text.clear();
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    open_element(&mut path, &mut current, &mut saw_root, name);
                    text.clear();
                    close_element(&mut path, &mut current, &mut raw_deps, &mut descriptor, "");
                }
                Event::Text(e) => {
                    let unescaped = e
                        .unescape()
                        .map_err(|e| Error::Parse(format!("bad text content: {e}")))?;
                    text.push_str(&unescaped);
                }
                Event::CData(e) => {
                    text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
                Event::End(_) => {
                    let value = std::mem::take(&mut text);
                    close_element(&mut path, &mut current, &mut raw_deps, &mut descriptor, &value);
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !saw_root {
            return Err(Error::Parse("document has no root element".to_string()));
        }
        if !path.is_empty() {
            return Err(Error::Parse(format!(
                "unexpected end of document inside <{}>",
                path.join("><")
            )));
        }

        for raw in raw_deps {
            let scope = raw.scope.as_deref().filter(|s| !s.is_empty());
            if !self.filter.retains(scope) {
                tracing::debug!(
                    "Skipping {:?}:{:?} with scope {:?}",
                    raw.group_id,
                    raw.artifact_id,
                    raw.scope
                );
                continue;
            }

            match Self::coordinate(&descriptor, raw) {
                Ok(coordinate) => descriptor.dependencies.push(coordinate),
                Err(e) => tracing::warn!("Skipping dependency: {}", e),
            }
        }

        Ok(descriptor)
    }

    /// Build a coordinate from a retained dependency, substituting each part.
    ///
    /// Fails when a part is absent (a version managed by a parent descriptor,
    /// for instance) or unusable as a repository path segment.
    fn coordinate(descriptor: &ProjectDescriptor, raw: RawDependency) -> Result<DependencyCoordinate> {
        let label = format!(
            "{}:{}",
            raw.group_id.as_deref().unwrap_or("?"),
            raw.artifact_id.as_deref().unwrap_or("?")
        );
        let require = |value: Option<String>, field: &str| {
            value.filter(|v| !v.is_empty()).ok_or_else(|| {
                Error::Parse(format!("{label} is missing <{field}>"))
            })
        };

        let group = require(raw.group_id, "groupId")?;
        let artifact = require(raw.artifact_id, "artifactId")?;
        let version = require(raw.version, "version")?;
        let packaging = raw
            .packaging
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

        let coordinate = DependencyCoordinate::new(
            descriptor.substitute(&group),
            descriptor.substitute(&artifact),
            descriptor.substitute(&version),
        )
        .with_extension(packaging);
        coordinate.validate()?;
        Ok(coordinate)
    }
}

impl Default for ProjectDescriptorParser {
    fn default() -> Self {
        Self::new()
    }
}

fn open_element(
    path: &mut Vec<String>,
    current: &mut Option<RawDependency>,
    saw_root: &mut bool,
    name: String,
) {
    if path.is_empty() {
        *saw_root = true;
    }
    path.push(name);

    if is_dependency(path) {
        *current = Some(RawDependency::default());
    }
}

fn close_element(
    path: &mut Vec<String>,
    current: &mut Option<RawDependency>,
    raw_deps: &mut Vec<RawDependency>,
    descriptor: &mut ProjectDescriptor,
    value: &str,
) {
    match path.as_slice() {
        [_, section, name] if section == "properties" => {
            descriptor.properties.insert(name.clone(), value.to_string());
        }
        [_, section, dep, field] if section == "dependencies" && dep == "dependency" => {
            if let Some(raw) = current.as_mut() {
                let slot = match field.as_str() {
                    "groupId" => Some(&mut raw.group_id),
                    "artifactId" => Some(&mut raw.artifact_id),
                    "version" => Some(&mut raw.version),
                    "scope" => Some(&mut raw.scope),
                    "type" => Some(&mut raw.packaging),
                    _ => None,
                };
                if let Some(slot) = slot {
                    *slot = Some(value.to_string());
                }
            }
        }
        _ if is_dependency(path) => {
            if let Some(raw) = current.take() {
                raw_deps.push(raw);
            }
        }
        _ => {}
    }

    path.pop();
}

fn is_dependency(path: &[String]) -> bool {
    matches!(path, [_, section, dep] if section == "dependencies" && dep == "dependency")
}
