//! Invertible Material Point Method for elastic solids.
//!
//! Particles carry CPDI2 domains (quadrilaterals in 2D, hexahedra in 3D)
//! whose corners are shared through a per-object mesh. Corners of severely
//! deformed particles are enriched: they receive mass and momentum directly
//! and are integrated independently of the background grid, which keeps the
//! deformation gradient from inverting.
//!
//! ```
//! use phyz_impm::{EnrichmentPolicy, GridConfig, InvertibleMpmSolid, Material, SolidParticle, SolverConfig};
//! use phyz_math::Vec2;
//!
//! let config = SolverConfig::new(GridConfig::new(&[0.0, 0.0], 0.5, &[8, 8]))
//!     .with_enrichment(EnrichmentPolicy::Never);
//! let mut solver = InvertibleMpmSolid::<2>::new(config)?;
//! let material = Material::NeoHookean { e: 1e5, nu: 0.3 };
//! solver.add_object(vec![SolidParticle::new(Vec2::new(2.0, 2.0), Vec2::zeros(), 1.0, 0.25, material)])?;
//!
//! let dt = solver.compute_time_step();
//! solver.advance_step(dt)?;
//! assert!(solver.object(0).unwrap().particles()[0].v.y < 0.0);
//! # Ok::<(), phyz_impm::ImpmError>(())
//! ```

pub mod config;
pub mod constitutive;
pub mod contact;
pub mod cpdi;
pub mod domain_mesh;
pub mod enrichment;
pub mod error;
pub mod explicit;
pub mod grid;
pub mod material;
pub mod object;
pub mod object_map;
pub mod observer;
pub mod particle;
pub mod solver;
pub mod transfer;
pub mod update;

pub use config::{GridConfig, SolverConfig, UpdateMethod};
pub use contact::{ActiveGridNodes, GridContactMethod};
pub use domain_mesh::{DomainCorner, DomainCornerMesh};
pub use enrichment::{EnrichmentCriterion, EnrichmentPolicy, ParticleKind};
pub use error::{ImpmError, Result};
pub use grid::{GridNodeState, NodeWeight, UniformGrid};
pub use material::Material;
pub use object::MpmObject;
pub use object_map::ObjectMap;
pub use observer::SolverObserver;
pub use particle::SolidParticle;
pub use solver::InvertibleMpmSolid;
