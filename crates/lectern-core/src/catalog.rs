//! Named element factories.
//!
//! The catalog is built once at startup and shared read-only by every hub.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::element::{ConfigDescriptor, Element};
use crate::envelope::GLOBAL_SENDER;
use crate::errors::CatalogError;

/// Creates a fresh, unwired element instance.
pub type ElementFactory = Arc<dyn Fn() -> Box<dyn Element> + Send + Sync>;

/// Table of element factories keyed by name.
#[derive(Clone, Default)]
pub struct ElementCatalog {
    factories: BTreeMap<String, ElementFactory>,
}

impl ElementCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`.
    ///
    /// Names must be unique and must not start with `_`, which is reserved
    /// for [`GLOBAL_SENDER`]-style hub messages.
    pub fn register<F>(&mut self, name: &str, factory: F) -> Result<(), CatalogError>
    where
        F: Fn() -> Box<dyn Element> + Send + Sync + 'static,
    {
        if name.starts_with('_') || name == GLOBAL_SENDER {
            return Err(CatalogError::ReservedName(name.to_string()));
        }
        if self.factories.contains_key(name) {
            return Err(CatalogError::AlreadyRegistered(name.to_string()));
        }
        let _ = self.factories.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    /// Instantiate the element registered under `name`.
    pub fn create(&self, name: &str) -> Option<Box<dyn Element>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Configuration descriptors of every element, keyed by registered name.
    pub fn descriptors(&self) -> Vec<(String, ConfigDescriptor)> {
        self.factories
            .iter()
            .map(|(name, factory)| (name.clone(), factory().config_descriptor()))
            .collect()
    }

    /// Number of registered elements.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no element is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for ElementCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementCatalog")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementChannels;
    use crate::errors::ElementError;

    struct Named(&'static str);

    impl Element for Named {
        fn config_descriptor(&self) -> ConfigDescriptor {
            ConfigDescriptor {
                name: self.0.into(),
                html: format!("<button>{}</button>", self.0),
            }
        }
        fn wire(&mut self, _channels: ElementChannels) {}
        fn activate(&mut self, _payload: &str) -> Result<(), ElementError> {
            Ok(())
        }
        fn deactivate(&mut self) {}
        fn last_admin_html(&self) -> String {
            String::new()
        }
        fn last_user_html(&self) -> String {
            String::new()
        }
    }

    fn catalog_with(names: &[&'static str]) -> ElementCatalog {
        let mut catalog = ElementCatalog::new();
        for &name in names {
            catalog
                .register(name, move || Box::new(Named(name)))
                .unwrap();
        }
        catalog
    }

    #[test]
    fn create_known_element() {
        let catalog = catalog_with(&["Blank"]);
        let element = catalog.create("Blank").unwrap();
        assert_eq!(element.config_descriptor().name, "Blank");
    }

    #[test]
    fn create_unknown_element_is_none() {
        let catalog = catalog_with(&["Blank"]);
        assert!(catalog.create("Nope").is_none());
        assert!(!catalog.contains("Nope"));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut catalog = catalog_with(&["Blank"]);
        let err = catalog
            .register("Blank", || Box::new(Named("Blank")))
            .unwrap_err();
        assert_eq!(err, CatalogError::AlreadyRegistered("Blank".into()));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn underscore_names_are_reserved() {
        let mut catalog = ElementCatalog::new();
        let err = catalog
            .register("_hidden", || Box::new(Named("_hidden")))
            .unwrap_err();
        assert_eq!(err, CatalogError::ReservedName("_hidden".into()));
        assert!(catalog.is_empty());
    }

    #[test]
    fn names_are_sorted() {
        let catalog = catalog_with(&["Wordcloud", "Blank", "Question"]);
        assert_eq!(catalog.names(), vec!["Blank", "Question", "Wordcloud"]);
    }

    #[test]
    fn descriptors_come_from_fresh_instances() {
        let catalog = catalog_with(&["Text", "Blank"]);
        let descriptors = catalog.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].0, "Blank");
        assert_eq!(descriptors[0].1.html, "<button>Blank</button>");
    }
}
