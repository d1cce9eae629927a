//! Isoparametric finite element basis evaluation and mesh boundary extraction.
//!
//! The crate is built around a few pieces:
//!
//! - the [`element`] catalogue of reference elements, their topology tables
//!   and shape functions derived by solving a nodal interpolation problem,
//! - [`quadrature`] rules for every element family,
//! - the [`ElementLibrary`], an immutable registry holding all of the above,
//!   built once and shared by reference,
//! - [`ElementEvaluator`]s and [`BoundaryElementEvaluator`]s
//!   which bind an element's physical nodes and evaluate the isoparametric map
//!   at each integration point,
//! - [`Mesh`]es, whose boundary facets are extracted and tagged on demand.
//!
//! # Integrating over a mesh
//!
//! ```
//! use isoparam::{mesh::box_mesh, ElementFamily, ElementLibrary, ElementOrder, QuadratureOrder};
//!
//! let lib = ElementLibrary::global();
//! let mesh = box_mesh(
//!     ElementFamily::Hexahedron,
//!     ElementOrder::QUADRATIC,
//!     [2.0, 1.0, 1.0],
//!     [4, 4, 4],
//! )?;
//! let volume = mesh.measure(lib)?;
//! assert!((volume - 2.0).abs() < 1e-12);
//!
//! // boundary facets are tagged 1..=6 by the side of the bounding box they lie on,
//! // in the order min-x, max-x, min-y, max-y, min-z, max-z
//! let top_area = mesh.integrate_boundary(lib, QuadratureOrder::Default, Some(6), |_| 1.0)?;
//! assert!((top_area - 2.0).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Element by element
//!
//! Evaluators give access to everything computed at an integration point,
//! e.g. to assemble element matrices:
//!
//! ```
//! # use isoparam::{mesh::box_mesh, ElementFamily, ElementLibrary, ElementOrder, QuadratureOrder};
//! # let lib = ElementLibrary::global();
//! # let mesh = box_mesh(ElementFamily::Triangle, ElementOrder::QUADRATIC, [1.0, 1.0], [2, 2])?;
//! let eval = mesh.evaluator(lib, 0, QuadratureOrder::Default)?;
//! let nne = mesh.nne();
//! let mut stiffness = isoparam::na::DMatrix::zeros(nne, nne);
//! for p in eval.points() {
//!     let p = p?;
//!     stiffness += &p.dn_dx * p.dn_dx.transpose() * p.det_jxw;
//! }
//! // rows of a stiffness matrix sum to zero
//! assert!(stiffness.row_sum().norm() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Logging
//!
//! Diagnostics are emitted through the [`log`](https://docs.rs/log) facade;
//! install any logger to see them.

#![warn(missing_docs)]

pub mod element;
#[doc(inline)]
pub use element::{ElementError, ElementFamily, ElementOrder, ReferenceElement};

pub mod quadrature;
#[doc(inline)]
pub use quadrature::{QuadratureOrder, QuadratureRule};

pub mod library;
#[doc(inline)]
pub use library::ElementLibrary;

pub mod cache;
#[doc(inline)]
pub use cache::CacheError;

pub mod evaluator;
#[doc(inline)]
pub use evaluator::{
    BoundaryElementEvaluator, BoundaryPointEvaluation, ElementEvaluator, PointEvaluation,
};

pub mod mesh;
#[doc(inline)]
pub use mesh::{BoundaryMesh, BoundingBox, Mesh, MeshError};

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 1D `nalgebra` vector.
pub type Vec1 = na::SVector<f64, 1>;
/// Type alias for a 2D `nalgebra` vector.
pub type Vec2 = na::Vector2<f64>;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
