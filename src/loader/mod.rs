//! Module loading.
//!
//! A load hands all sources to the owning backend in one call and commits the
//! resulting module only on full success: if any source fails to parse, the
//! entire load fails and no partial module is retained. Repeated loads with
//! the same tag accumulate modules in load order; `LoadOptions::isolation`
//! replaces the backend's prior modules instead.

use crate::backend::{BackendRegistry, Export, Source};
use crate::config::LoadOptions;
use crate::errors::DispatchError;
use crate::logging;
use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;

/// Result of one successful load: an ordered export set bound to a
/// backend-side unit.
#[derive(Debug)]
pub struct Module {
    name: String,
    backend: String,
    unit: u64,
    exports: Vec<Export>,
}

impl Module {
    pub(crate) fn new(name: String, backend: String, unit: u64, exports: Vec<Export>) -> Self {
        Self { name, backend, unit, exports }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag of the owning backend.
    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn unit(&self) -> u64 {
        self.unit
    }

    /// Exported symbols in declaration order.
    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn resolve(&self, symbol: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.symbol == symbol)
    }
}

/// Loaded modules in load order.
pub struct ModuleSet {
    modules: RwLock<Vec<Arc<Module>>>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self { modules: RwLock::new(Vec::new()) }
    }

    pub(crate) fn push(&self, module: Arc<Module>) {
        self.modules.write().push(module);
    }

    /// Resolve a symbol to its module and export.
    ///
    /// A plain name searches modules in load order; the first match wins, so
    /// later loads can be shadowed by earlier ones. A scoped
    /// `module::symbol` name pins resolution to one module.
    pub fn resolve(&self, name: &str) -> Option<(Arc<Module>, Export)> {
        let modules = self.modules.read();

        if let Some((module_name, symbol)) = name.split_once("::") {
            return modules
                .iter()
                .find(|module| module.name() == module_name)
                .and_then(|module| {
                    module
                        .resolve(symbol)
                        .cloned()
                        .map(|export| (Arc::clone(module), export))
                });
        }

        for module in modules.iter() {
            if let Some(export) = module.resolve(name) {
                return Some((Arc::clone(module), export.clone()));
            }
        }
        None
    }

    /// Drop every module owned by `tag`, returning them for backend cleanup.
    pub(crate) fn remove_backend(&self, tag: &str) -> Vec<Arc<Module>> {
        let mut modules = self.modules.write();
        let mut removed = Vec::new();
        modules.retain(|module| {
            if module.backend() == tag {
                removed.push(Arc::clone(module));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop every module, in reverse load order.
    pub(crate) fn clear(&self) -> Vec<Arc<Module>> {
        let mut modules = self.modules.write();
        let mut removed: Vec<_> = modules.drain(..).collect();
        removed.reverse();
        removed
    }

    /// Every visible symbol, in resolution order, as `module::symbol`.
    pub fn symbols(&self) -> Vec<String> {
        self.modules
            .read()
            .iter()
            .flat_map(|module| {
                module
                    .exports()
                    .iter()
                    .map(|export| format!("{}::{}", module.name(), export.symbol))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }
}

impl Default for ModuleSet {
    fn default() -> Self {
        Self::new()
    }
}

fn derive_module_name(sources: &[Source]) -> String {
    let first = sources[0].name();
    Path::new(&first)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or(first)
}

/// Load `sources` against the backend registered under `tag` and commit the
/// resulting module into `modules`.
pub(crate) fn load(
    registry: &BackendRegistry,
    modules: &ModuleSet,
    tag: &str,
    sources: Vec<Source>,
    options: &LoadOptions,
) -> Result<(), DispatchError> {
    if sources.is_empty() {
        return Err(DispatchError::load_failed(tag, "no sources given"));
    }

    let slot = registry.lookup(tag)?;
    slot.ensure_enabled()?;

    let capabilities = slot.backend().capabilities();
    for source in &sources {
        let supported = match source {
            Source::File(_) => capabilities.load_file,
            Source::Buffer { .. } => capabilities.load_buffer,
        };
        if !supported {
            return Err(DispatchError::load_failed(
                tag,
                format!("backend cannot load source '{}'", source.name()),
            ));
        }
    }

    let loaded = {
        let _serial = slot.serialized();
        slot.backend().load(&sources)
    };

    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            logging::log_load_failed(tag, &err.message);
            return Err(DispatchError::load_failed(tag, err.message));
        }
    };

    let name = options
        .module_name
        .clone()
        .unwrap_or_else(|| derive_module_name(&sources));

    if options.isolation {
        for stale in modules.remove_backend(tag) {
            slot.backend().unload(stale.unit());
        }
    }

    logging::log_load(tag, &name, loaded.exports.len());
    modules.push(Arc::new(Module::new(name, tag.to_string(), loaded.unit, loaded.exports)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::backend::Signature;
    use crate::core::TypeTag;
    use crate::errors::ErrorKind;

    fn export(symbol: &str) -> Export {
        Export {
            symbol: symbol.to_string(),
            signature: Signature::new(vec![], TypeTag::Null),
        }
    }

    fn module(name: &str, backend: &str, unit: u64, symbols: &[&str]) -> Arc<Module> {
        Arc::new(Module::new(
            name.to_string(),
            backend.to_string(),
            unit,
            symbols.iter().map(|symbol| export(symbol)).collect(),
        ))
    }

    fn buffer(name: &str, contents: &str) -> Source {
        Source::Buffer { name: name.to_string(), contents: contents.to_string() }
    }

    fn mock_registry() -> BackendRegistry {
        let registry = BackendRegistry::new();
        registry.register(Box::new(MockBackend::new())).unwrap();
        registry.initialize_all();
        registry
    }

    #[test]
    fn test_first_module_in_load_order_wins() {
        let set = ModuleSet::new();
        set.push(module("first", "mock", 1, &["shared", "only_first"]));
        set.push(module("second", "mock", 2, &["shared"]));

        let (owner, _) = set.resolve("shared").unwrap();
        assert_eq!(owner.name(), "first");

        let (owner, _) = set.resolve("only_first").unwrap();
        assert_eq!(owner.name(), "first");
    }

    #[test]
    fn test_scoped_name_bypasses_shadowing() {
        let set = ModuleSet::new();
        set.push(module("first", "mock", 1, &["shared"]));
        set.push(module("second", "mock", 2, &["shared"]));

        let (owner, export) = set.resolve("second::shared").unwrap();
        assert_eq!(owner.name(), "second");
        assert_eq!(export.symbol, "shared");

        assert!(set.resolve("third::shared").is_none());
    }

    #[test]
    fn test_symbols_lists_resolution_order() {
        let set = ModuleSet::new();
        set.push(module("a", "mock", 1, &["f", "g"]));
        set.push(module("b", "mock", 2, &["h"]));
        assert_eq!(set.symbols(), vec!["a::f", "a::g", "b::h"]);
    }

    #[test]
    fn test_load_commits_module() {
        let registry = mock_registry();
        let modules = ModuleSet::new();

        load(
            &registry,
            &modules,
            "mock",
            vec![buffer("test.mock", "fn three_str(str, str, str) -> str\n")],
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(modules.len(), 1);
        let (owner, export) = modules.resolve("three_str").unwrap();
        assert_eq!(owner.name(), "test");
        assert_eq!(export.signature.arity(), 3);
    }

    #[test]
    fn test_failed_load_is_atomic() {
        let registry = mock_registry();
        let modules = ModuleSet::new();

        let err = load(
            &registry,
            &modules,
            "mock",
            vec![
                buffer("good.mock", "fn fine() -> int\n"),
                buffer("bad.mock", "not a declaration\n"),
            ],
            &LoadOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err.kind(), ErrorKind::LoadFailed { .. }));
        assert!(modules.is_empty(), "no partial module may survive");
        assert!(modules.resolve("fine").is_none());
    }

    #[test]
    fn test_loads_accumulate_by_default() {
        let registry = mock_registry();
        let modules = ModuleSet::new();

        load(
            &registry,
            &modules,
            "mock",
            vec![buffer("one.mock", "fn f() -> int\n")],
            &LoadOptions::default(),
        )
        .unwrap();
        load(
            &registry,
            &modules,
            "mock",
            vec![buffer("two.mock", "fn g() -> int\n")],
            &LoadOptions::default(),
        )
        .unwrap();

        assert_eq!(modules.len(), 2);
        assert!(modules.resolve("f").is_some());
        assert!(modules.resolve("g").is_some());
    }

    #[test]
    fn test_isolation_replaces_prior_modules() {
        let registry = mock_registry();
        let modules = ModuleSet::new();

        load(
            &registry,
            &modules,
            "mock",
            vec![buffer("one.mock", "fn f() -> int\n")],
            &LoadOptions::default(),
        )
        .unwrap();
        load(
            &registry,
            &modules,
            "mock",
            vec![buffer("two.mock", "fn g() -> int\n")],
            &LoadOptions::isolated(),
        )
        .unwrap();

        assert_eq!(modules.len(), 1);
        assert!(modules.resolve("f").is_none());
        assert!(modules.resolve("g").is_some());
    }

    #[test]
    fn test_load_against_unknown_tag_fails() {
        let registry = mock_registry();
        let modules = ModuleSet::new();
        let err = load(
            &registry,
            &modules,
            "rb",
            vec![buffer("x", "")],
            &LoadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownBackend { .. }));
    }

    #[test]
    fn test_empty_source_list_is_rejected() {
        let registry = mock_registry();
        let modules = ModuleSet::new();
        let err = load(&registry, &modules, "mock", vec![], &LoadOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::LoadFailed { .. }));
    }
}
