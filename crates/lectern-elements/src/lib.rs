//! # lectern-elements
//!
//! Reference interaction elements shipped with the Lectern server:
//!
//! - [`Blank`]: clears both views
//! - [`Text`]: shows the same Markdown text to admins and users
//! - [`Question`]: single-choice poll with live counts and a JSON export
//! - [`Wordcloud`]: free-word cloud fed through the data channels
//!
//! [`default_catalog`] registers all four under their display names.

#![deny(unsafe_code)]

pub mod blank;
pub mod html;
pub mod question;
pub mod text;
pub mod wordcloud;
mod worker;

pub use blank::Blank;
pub use question::Question;
pub use text::Text;
pub use wordcloud::Wordcloud;

use lectern_core::{CatalogError, ElementCatalog};

/// Catalog containing every reference element.
pub fn default_catalog() -> Result<ElementCatalog, CatalogError> {
    let mut catalog = ElementCatalog::new();
    catalog.register(blank::NAME, || Box::new(Blank::new()))?;
    catalog.register(text::NAME, || Box::new(Text::new()))?;
    catalog.register(question::NAME, || Box::new(Question::new()))?;
    catalog.register(wordcloud::NAME, || Box::new(Wordcloud::new()))?;
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_lists_all_elements() {
        let catalog = default_catalog().unwrap();
        assert_eq!(
            catalog.names(),
            vec!["Blank", "Question", "Text", "Wordcloud"]
        );
    }

    #[test]
    fn descriptor_names_match_registration() {
        let catalog = default_catalog().unwrap();
        for (name, descriptor) in catalog.descriptors() {
            assert_eq!(name, descriptor.name);
            assert!(descriptor.html.contains(&format!("'{name}'")));
        }
    }

    #[test]
    fn only_downloadable_and_data_capabilities_where_expected() {
        let catalog = default_catalog().unwrap();
        let mut question = catalog.create("Question").unwrap();
        assert!(question.as_downloadable().is_some());
        assert!(question.as_data_element().is_none());

        let mut cloud = catalog.create("Wordcloud").unwrap();
        assert!(cloud.as_downloadable().is_none());
        assert!(cloud.as_data_element().is_some());
    }
}
