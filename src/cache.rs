//! Persisting derived shape functions between runs.
//!
//! The cache is a JSON document listing the terms of every basis polynomial
//! of every supported element:
//! ```text
//! {
//!   "version": 1,
//!   "elements": [
//!     { "family": "Triangle", "order": 0,
//!       "functions": [ [ { "coefficient": 1.0, "exponents": [0, 0, 0] }, ... ], ... ] },
//!     ...
//!   ]
//! }
//! ```
//! Gradients are not stored; they are cheap to recompute from the polynomials.

use std::path::Path;

use itertools::Itertools;
use json::JsonValue;
use log::{debug, warn};

use crate::{
    element::{
        polynomial::{Monomial, Polynomial},
        shape::ShapeFunctionSet,
        ElementError, ElementFamily, ElementOrder,
    },
    ElementLibrary,
};

const CACHE_VERSION: u32 = 1;
/// Largest deviation of a loaded shape function from 1 at its own node
/// and 0 at the others.
const NODAL_TOLERANCE: f64 = 1e-9;

/// Error in reading or writing a shape function cache.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// Reading or writing the file failed.
    #[error("Shape function cache I/O failed")]
    Io(#[from] std::io::Error),
    /// The file is not valid JSON.
    ///
    /// (parser error converted to string
    /// so that the error stays `Send` and `Sync` regardless of the parser's types)
    #[error("Parsing the shape function cache failed: {0}")]
    Parse(String),
    /// The JSON is valid but doesn't describe a shape function cache.
    #[error("Malformed shape function cache: {0}")]
    Malformed(String),
    /// The cached data doesn't describe the supported catalogue.
    #[error("Cached shape functions are inconsistent with the element catalogue")]
    Element(#[from] ElementError),
}

impl ElementLibrary {
    /// Write the derived shape functions of this library to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let mut sets: Vec<&ShapeFunctionSet> = self.shape_sets().collect();
        sets.sort_by_key(|s| (s.family(), s.order()));
        let elements: Vec<JsonValue> = sets.into_iter().map(shape_set_to_json).collect();
        let doc = json::object! {
            "version": CACHE_VERSION,
            "elements": JsonValue::Array(elements),
        };
        std::fs::write(path.as_ref(), doc.pretty(2))?;
        debug!("wrote shape function cache to {}", path.as_ref().display());
        Ok(())
    }

    /// Build a library from shape functions stored by [`save`][Self::save].
    ///
    /// Every element must appear exactly once,
    /// and each of its shape functions must still be 1 at its own node and 0 at the others.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let doc = json::parse(&contents).map_err(|e| CacheError::Parse(format!("{}", e)))?;

        if doc["version"].as_u32() != Some(CACHE_VERSION) {
            return Err(CacheError::Malformed(format!(
                "unsupported cache version {}",
                doc["version"]
            )));
        }
        if !doc["elements"].is_array() {
            return Err(CacheError::Malformed("missing element list".into()));
        }
        let sets = doc["elements"]
            .members()
            .map(shape_set_from_json)
            .collect::<Result<Vec<_>, _>>()?;

        let duplicate = sets
            .iter()
            .map(|s| (s.family(), s.order()))
            .duplicates()
            .next();
        if let Some((family, order)) = duplicate {
            return Err(CacheError::Malformed(format!(
                "{family:?} of order {order} is listed more than once"
            )));
        }
        for set in &sets {
            check_nodal_values(set)?;
        }

        Ok(Self::from_shape_sets(sets)?)
    }

    /// Load a library from a cache file,
    /// or derive one and write the cache if the file can't be used.
    ///
    /// Failing to write the cache is not an error;
    /// the freshly derived library is returned regardless.
    pub fn load_or_derive(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(lib) => {
                debug!("loaded shape function cache from {}", path.display());
                return Ok(lib);
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no shape function cache at {}, deriving", path.display());
            }
            Err(e) => {
                warn!("ignoring unusable shape function cache at {}: {e}", path.display());
            }
        }

        let lib = Self::new()?;
        if let Err(e) = lib.save(path) {
            warn!("could not write shape function cache to {}: {e}", path.display());
        }
        Ok(lib)
    }
}

fn shape_set_to_json(set: &ShapeFunctionSet) -> JsonValue {
    let functions: Vec<JsonValue> = set
        .functions()
        .iter()
        .map(|f| {
            let terms = f
                .terms()
                .iter()
                .map(|t| {
                    json::object! {
                        "coefficient": t.coefficient,
                        "exponents": json::array![t.monomial.0[0], t.monomial.0[1], t.monomial.0[2]],
                    }
                })
                .collect();
            JsonValue::Array(terms)
        })
        .collect();
    json::object! {
        "family": format!("{:?}", set.family()),
        "order": set.order().0,
        "functions": JsonValue::Array(functions),
    }
}

fn shape_set_from_json(value: &JsonValue) -> Result<ShapeFunctionSet, CacheError> {
    let family_name = value["family"]
        .as_str()
        .ok_or_else(|| CacheError::Malformed("element without a family".into()))?;
    let family = ElementFamily::ALL
        .into_iter()
        .find(|f| format!("{f:?}") == family_name)
        .ok_or_else(|| CacheError::Malformed(format!("unknown element family {family_name}")))?;
    let order = value["order"]
        .as_u8()
        .map(ElementOrder)
        .ok_or_else(|| CacheError::Malformed(format!("{family_name} element without an order")))?;

    let functions = value["functions"]
        .members()
        .map(polynomial_from_json)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ShapeFunctionSet::from_polynomials(family, order, functions)?)
}

fn check_nodal_values(set: &ShapeFunctionSet) -> Result<(), CacheError> {
    for (j, node) in set.reference().nodes.iter().enumerate() {
        for (i, value) in set.values(node).iter().enumerate() {
            let expected = if i == j { 1.0 } else { 0.0 };
            if (value - expected).abs() > NODAL_TOLERANCE {
                return Err(CacheError::Malformed(format!(
                    "{:?} of order {}: shape function {i} is {value} at node {j}",
                    set.family(),
                    set.order()
                )));
            }
        }
    }
    Ok(())
}

fn polynomial_from_json(value: &JsonValue) -> Result<Polynomial, CacheError> {
    let mut monomials = Vec::new();
    let mut coefficients = Vec::new();
    for term in value.members() {
        let coefficient = term["coefficient"]
            .as_f64()
            .ok_or_else(|| CacheError::Malformed("term without a coefficient".into()))?;
        let exps: Vec<u8> = term["exponents"].members().filter_map(|e| e.as_u8()).collect();
        let exps: [u8; 3] = exps
            .try_into()
            .map_err(|_| CacheError::Malformed("term exponents must be 3 small integers".into()))?;
        monomials.push(Monomial(exps));
        coefficients.push(coefficient);
    }
    Ok(Polynomial::from_coefficients(&monomials, coefficients, 0.0))
}
