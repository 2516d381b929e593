//! Static category configuration.
//!
//! Categories and their subcategory sets are plain data injected at startup,
//! not a lookup table resolved at call time. Callers construct one
//! `CategoryConfig` and pass it wherever products are validated.

use serde::{Deserialize, Serialize};

use bodega_core::{DomainError, DomainResult};

/// One enumerated category with its allowed subcategories.
///
/// An empty subcategory list means the category takes no subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub subcategories: Vec<String>,
}

impl Category {
    pub fn new(name: impl Into<String>, subcategories: &[&str]) -> Self {
        Self {
            name: name.into(),
            subcategories: subcategories.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Injected catalog taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    categories: Vec<Category>,
}

impl CategoryConfig {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// The default taxonomy of the small-retail deployment.
    pub fn standard_grocery() -> Self {
        Self::new(vec![
            Category::new("Abarrotes", &["Arroz", "Azúcar", "Aceites", "Fideos", "Conservas"]),
            Category::new("Huevos y Lácteos", &["Leche", "Huevos", "Yogurt", "Quesos"]),
            Category::new("Carnes y Embutidos", &[]),
            Category::new("Frutas y Verduras", &[]),
            Category::new("Bebidas", &["Gaseosas", "Aguas", "Jugos"]),
            Category::new("Snacks y Golosinas", &[]),
            Category::new("Limpieza del Hogar", &[]),
            Category::new("Higiene Personal", &[]),
            Category::new("Panadería", &[]),
            Category::new("Congelados", &[]),
        ])
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    fn find(&self, category: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == category)
    }

    /// Validate a category/subcategory pair against the configuration.
    pub fn validate(&self, category: &str, subcategory: Option<&str>) -> DomainResult<()> {
        let Some(cat) = self.find(category) else {
            return Err(DomainError::validation(format!(
                "unknown category: {category}"
            )));
        };

        match subcategory {
            None => Ok(()),
            Some(sub) => {
                if cat.subcategories.iter().any(|s| s == sub) {
                    Ok(())
                } else {
                    Err(DomainError::validation(format!(
                        "unknown subcategory '{sub}' for category '{category}'"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_pairs() {
        let config = CategoryConfig::standard_grocery();
        assert!(config.validate("Abarrotes", Some("Arroz")).is_ok());
        assert!(config.validate("Frutas y Verduras", None).is_ok());
    }

    #[test]
    fn rejects_unknown_category_and_subcategory() {
        let config = CategoryConfig::standard_grocery();
        assert!(config.validate("Ferretería", None).is_err());
        assert!(config.validate("Abarrotes", Some("Llantas")).is_err());
    }
}
