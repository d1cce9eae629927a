//! The shared registry of shape functions and quadrature rules.
//!
//! Everything here is computed once when the library is built
//! and only read afterwards, so a single library can serve
//! any number of evaluators on any number of threads.

use std::{collections::HashMap, sync::OnceLock};

use log::debug;

use crate::{
    element::{shape::ShapeFunctionSet, ElementError, ElementFamily, ElementOrder},
    quadrature::{max_degree, QuadratureOrder, QuadratureRule},
};

/// Immutable tables of every supported shape function set and quadrature rule.
#[derive(Clone, Debug)]
pub struct ElementLibrary {
    shapes: HashMap<(ElementFamily, ElementOrder), ShapeFunctionSet>,
    /// rules keyed by the requested (not delivered) degree
    rules: HashMap<(ElementFamily, usize), QuadratureRule>,
}

static GLOBAL_LIBRARY: OnceLock<ElementLibrary> = OnceLock::new();

impl ElementLibrary {
    /// Derive every supported shape function set and tabulate every quadrature rule.
    pub fn new() -> Result<Self, ElementError> {
        let shapes = ElementFamily::ALL
            .into_iter()
            .flat_map(|family| family.orders().map(move |order| (family, order)))
            .map(|(family, order)| ShapeFunctionSet::derive(family, order))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_shape_sets(shapes)
    }

    /// Build a library around already derived shape function sets.
    ///
    /// Every supported element must be present exactly once.
    pub(crate) fn from_shape_sets(sets: Vec<ShapeFunctionSet>) -> Result<Self, ElementError> {
        let mut shapes = HashMap::new();
        for set in sets {
            shapes.insert((set.family(), set.order()), set);
        }
        for family in ElementFamily::ALL {
            for order in family.orders() {
                if !shapes.contains_key(&(family, order)) {
                    return Err(ElementError::UnsupportedElement { family, order });
                }
            }
        }

        let mut rules = HashMap::new();
        for family in ElementFamily::ALL {
            let top = if family == ElementFamily::Point {
                0
            } else {
                max_degree(family)
            };
            for degree in 0..=top {
                let rule = QuadratureRule::new(family, QuadratureOrder::Degree(degree))?;
                rules.insert((family, degree), rule);
            }
        }
        debug!(
            "element library ready: {} shape function sets, {} quadrature rules",
            shapes.len(),
            rules.len()
        );

        Ok(Self { shapes, rules })
    }

    /// The process-wide library, built on first access.
    pub fn global() -> &'static ElementLibrary {
        GLOBAL_LIBRARY.get_or_init(|| {
            ElementLibrary::new()
                .expect("Deriving the element catalogue failed. This is a bug in isoparam")
        })
    }

    /// Look up the shape functions of an element.
    pub fn shape_functions(
        &self,
        family: ElementFamily,
        order: ElementOrder,
    ) -> Result<&ShapeFunctionSet, ElementError> {
        self.shapes
            .get(&(family, order))
            .ok_or(ElementError::UnsupportedElement { family, order })
    }

    /// Look up a quadrature rule.
    pub fn quadrature(
        &self,
        family: ElementFamily,
        order: QuadratureOrder,
    ) -> Result<&QuadratureRule, ElementError> {
        let degree = order.degree_for(family);
        let key = if family == ElementFamily::Point {
            0
        } else {
            degree
        };
        self.rules
            .get(&(family, key))
            .ok_or(ElementError::UnsupportedQuadrature { family, degree })
    }

    /// Iterate over every shape function set, in no particular order.
    pub fn shape_sets(&self) -> impl '_ + Iterator<Item = &ShapeFunctionSet> {
        self.shapes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_covers_catalogue() {
        let lib = ElementLibrary::global();
        assert_eq!(lib.shape_sets().count(), 14);
        for family in ElementFamily::ALL {
            for order in family.orders() {
                let set = lib.shape_functions(family, order).unwrap();
                assert_eq!((set.family(), set.order()), (family, order));
            }
            let rule = lib.quadrature(family, QuadratureOrder::Default).unwrap();
            assert_eq!(rule.family(), family);
        }
        assert!(lib
            .shape_functions(ElementFamily::Quadrilateral, ElementOrder::CUBIC)
            .is_err());
        assert_eq!(
            lib.quadrature(ElementFamily::Triangle, QuadratureOrder::Degree(30)),
            Err(ElementError::UnsupportedQuadrature {
                family: ElementFamily::Triangle,
                degree: 30
            })
        );
    }

    #[test]
    fn library_matches_direct_construction() {
        let lib = ElementLibrary::global();
        let direct = QuadratureRule::new(ElementFamily::Triangle, QuadratureOrder::Degree(3)).unwrap();
        assert_eq!(
            lib.quadrature(ElementFamily::Triangle, QuadratureOrder::Degree(3)),
            Ok(&direct)
        );
        let direct = ShapeFunctionSet::derive(ElementFamily::Hexahedron, ElementOrder::QUADRATIC)
            .unwrap();
        assert_eq!(
            lib.shape_functions(ElementFamily::Hexahedron, ElementOrder::QUADRATIC),
            Ok(&direct)
        );
    }

    #[test]
    fn incomplete_shape_sets_are_rejected() {
        let sets = vec![ShapeFunctionSet::derive(ElementFamily::Line, ElementOrder::LINEAR).unwrap()];
        assert!(matches!(
            ElementLibrary::from_shape_sets(sets),
            Err(ElementError::UnsupportedElement { .. })
        ));
    }

    #[test]
    fn library_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<ElementLibrary>();
        let lib = ElementLibrary::global();
        let counts: Vec<usize> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        lib.quadrature(ElementFamily::Hexahedron, QuadratureOrder::Default)
                            .map(|r| r.len())
                            .unwrap_or(0)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(counts, vec![27; 4]);
    }
}
