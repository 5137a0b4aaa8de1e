//! Named types that transform documents may refer to
//!
//! Transforms and locators are looked up by name among the modules registered
//! for a transformation. A module is an explicit table of constructors; the
//! built-in one is always registered first and `xdt:Import` adds more through
//! a [`ModuleLoader`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use xdt_traits::{Error, Result, TypeKind};

use crate::locator::Locator;
use crate::locators::{ConditionLocator, MatchLocator, XPathLocator};
use crate::transform::Transform;
use crate::transforms::{
    Insert, InsertAfter, InsertBefore, InsertIfMissing, Remove, RemoveAll, RemoveAttributes,
    Replace, SetAttributes,
};

/// Name of the built-in module and the namespace of its types
pub const BUILTIN_NAMESPACE: &str = "Microsoft.Web.XmlTransform";

/// An entry of a module's type table
#[derive(Clone, Copy)]
pub enum NamedType {
    Transform(fn() -> Box<dyn Transform>),
    Locator(fn() -> Box<dyn Locator>),
    /// A base that can be named but not instantiated
    Abstract(TypeKind),
}

impl NamedType {
    pub fn kind(&self) -> TypeKind {
        match self {
            NamedType::Transform(_) => TypeKind::Transform,
            NamedType::Locator(_) => TypeKind::Locator,
            NamedType::Abstract(kind) => *kind,
        }
    }
}

impl std::fmt::Debug for NamedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NamedType::Abstract(kind) => write!(f, "Abstract({})", kind),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Constructor for a transform with a `Default` impl
pub fn transform<T: Transform + Default + 'static>() -> Box<dyn Transform> {
    Box::new(T::default())
}

/// Constructor for a locator with a `Default` impl
pub fn locator<T: Locator + Default + 'static>() -> Box<dyn Locator> {
    Box::new(T::default())
}

/// A table of named types, keyed by namespace and name
#[derive(Debug, Clone, Default)]
pub struct TypeModule {
    types: Vec<(String, String, NamedType)>,
}

impl TypeModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, namespace: &str, name: &str, named: NamedType) -> Self {
        self.add(namespace, name, named);
        self
    }

    pub fn with_transform(self, namespace: &str, name: &str, ctor: fn() -> Box<dyn Transform>) -> Self {
        self.with_type(namespace, name, NamedType::Transform(ctor))
    }

    pub fn with_locator(self, namespace: &str, name: &str, ctor: fn() -> Box<dyn Locator>) -> Self {
        self.with_type(namespace, name, NamedType::Locator(ctor))
    }

    pub fn add(&mut self, namespace: &str, name: &str, named: NamedType) {
        self.types.push((namespace.to_string(), name.to_string(), named));
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<NamedType> {
        self.types
            .iter()
            .find(|(ns, n, _)| ns == namespace && n == name)
            .map(|(_, _, named)| *named)
    }

    /// The module holding the stock transforms and locators
    pub fn builtin() -> Self {
        let ns = BUILTIN_NAMESPACE;
        TypeModule::new()
            .with_type(ns, "Transform", NamedType::Abstract(TypeKind::Transform))
            .with_type(ns, "AttributeTransform", NamedType::Abstract(TypeKind::Transform))
            .with_type(ns, "Locator", NamedType::Abstract(TypeKind::Locator))
            .with_transform(ns, "Replace", transform::<Replace>)
            .with_transform(ns, "Remove", transform::<Remove>)
            .with_transform(ns, "RemoveAll", transform::<RemoveAll>)
            .with_transform(ns, "Insert", transform::<Insert>)
            .with_transform(ns, "InsertIfMissing", transform::<InsertIfMissing>)
            .with_transform(ns, "InsertBefore", transform::<InsertBefore>)
            .with_transform(ns, "InsertAfter", transform::<InsertAfter>)
            .with_transform(ns, "SetAttributes", transform::<SetAttributes>)
            .with_transform(ns, "RemoveAttributes", transform::<RemoveAttributes>)
            .with_locator(ns, "Match", locator::<MatchLocator>)
            .with_locator(ns, "Condition", locator::<ConditionLocator>)
            .with_locator(ns, "XPath", locator::<XPathLocator>)
    }
}

/// Source of the modules named by `xdt:Import`
pub trait ModuleLoader {
    /// Module registered under `name` (`assembly="…"`)
    fn load_module(&self, name: &str) -> Result<TypeModule>;

    /// Module stored at `path` (`path="…"`), already resolved
    fn load_path(&self, path: &Path) -> Result<TypeModule>;
}

/// Loader backed by in-memory tables
#[derive(Debug, Clone, Default)]
pub struct StaticModuleLoader {
    by_name: HashMap<String, TypeModule>,
    by_path: HashMap<PathBuf, TypeModule>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, name: &str, module: TypeModule) -> Self {
        self.by_name.insert(name.to_string(), module);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>, module: TypeModule) -> Self {
        self.by_path.insert(path.into(), module);
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load_module(&self, name: &str) -> Result<TypeModule> {
        if name == BUILTIN_NAMESPACE {
            return Ok(TypeModule::builtin());
        }
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::operation(format!("Could not load module '{}'", name)))
    }

    fn load_path(&self, path: &Path) -> Result<TypeModule> {
        self.by_path
            .get(path)
            .cloned()
            .ok_or_else(|| Error::operation(format!("Could not load module from '{}'", path.display())))
    }
}

#[derive(Debug)]
struct Registration {
    /// Module name or resolved path the module came from
    source: String,
    module: TypeModule,
    namespace: String,
}

/// Resolves directive names to constructed transforms and locators
pub struct NamedTypeRegistry {
    registrations: Vec<Registration>,
    loader: Box<dyn ModuleLoader>,
    relative_root: Option<PathBuf>,
}

impl NamedTypeRegistry {
    pub fn new(loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            registrations: vec![Registration {
                source: BUILTIN_NAMESPACE.to_string(),
                module: TypeModule::builtin(),
                namespace: BUILTIN_NAMESPACE.to_string(),
            }],
            loader,
            relative_root: None,
        }
    }

    /// Directory that relative `path` registrations are resolved against
    pub fn set_relative_root(&mut self, root: Option<PathBuf>) {
        self.relative_root = root;
    }

    pub fn add_module_registration(&mut self, module_name: &str, namespace: &str) -> Result<()> {
        if self.is_registered(module_name, namespace) {
            return Ok(());
        }
        let module = self.loader.load_module(module_name)?;
        log::debug!("registered module '{}' for namespace '{}'", module_name, namespace);
        self.registrations.push(Registration {
            source: module_name.to_string(),
            module,
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    pub fn add_path_registration(&mut self, path: &str, namespace: &str) -> Result<()> {
        let path = Path::new(path);
        let resolved = match &self.relative_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        };
        let source = resolved.to_string_lossy().into_owned();
        if self.is_registered(&source, namespace) {
            return Ok(());
        }
        let module = self.loader.load_path(&resolved)?;
        log::debug!("registered module at '{}' for namespace '{}'", source, namespace);
        self.registrations.push(Registration {
            source,
            module,
            namespace: namespace.to_string(),
        });
        Ok(())
    }

    /// Registering the same module for the same namespace twice is a no-op
    fn is_registered(&self, source: &str, namespace: &str) -> bool {
        self.registrations
            .iter()
            .any(|r| r.source == source && r.namespace == namespace)
    }

    pub fn construct_transform(&self, name: &str) -> Result<Box<dyn Transform>> {
        match self.resolve(name, TypeKind::Transform)? {
            NamedType::Transform(ctor) => Ok(ctor()),
            _ => Err(Error::NotConstructible { name: name.to_string() }),
        }
    }

    pub fn construct_locator(&self, name: &str) -> Result<Box<dyn Locator>> {
        match self.resolve(name, TypeKind::Locator)? {
            NamedType::Locator(ctor) => Ok(ctor()),
            _ => Err(Error::NotConstructible { name: name.to_string() }),
        }
    }

    fn resolve(&self, name: &str, kind: TypeKind) -> Result<NamedType> {
        let mut found = self
            .registrations
            .iter()
            .filter_map(|r| r.module.get(&r.namespace, name));
        let named = found.next().ok_or_else(|| Error::UnknownName {
            name: name.to_string(),
            kind,
        })?;
        if found.next().is_some() {
            return Err(Error::AmbiguousName { name: name.to_string() });
        }
        if named.kind() != kind {
            return Err(Error::IncompatibleKind {
                name: name.to_string(),
                expected: kind,
                found: named.kind(),
            });
        }
        Ok(named)
    }
}

impl Default for NamedTypeRegistry {
    fn default() -> Self {
        Self::new(Box::new(StaticModuleLoader::new()))
    }
}
