// fluid_cursor - GPU Fluid Cursor Effect
// Copyright (c) 2025 Filipe da Veiga Ventura Alves
// Licensed under MIT License

//! Real-time 2D fluid simulation on the GPU, driven by pointer input.
//!
//! Velocity, dye and pressure live in double-buffered float textures. Each
//! frame applies pointer splats, runs vorticity confinement, a Jacobi
//! pressure projection and semi-Lagrangian advection as a fixed sequence of
//! full-screen fragment passes, then composites the dye onto the surface.

pub mod capabilities;
pub mod capture;
pub mod color;
pub mod config;
pub mod context;
pub mod display;
pub mod engine;
pub mod fields;
pub mod pointer;
pub mod program;
pub mod reference;
pub mod scheduler;
pub mod splat;
pub mod step;
pub mod target;

pub use capabilities::{Capabilities, TexelType};
pub use color::Rgb;
pub use config::{FluidConfig, Precision};
pub use context::GpuContext;
pub use display::{DisplayKeyword, DisplayMaterial, KeywordSet};
pub use engine::FluidSim;
pub use fields::{resolution, SimulationFields};
pub use pointer::{Pointer, PointerTracker, MOUSE_ID};
pub use program::{ProgramKind, ProgramSet};
pub use splat::Splat;
pub use target::{DoubleBuffered, FieldTarget, RenderTarget};
