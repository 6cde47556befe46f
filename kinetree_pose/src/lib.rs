// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Kinetree Pose: the rigid-body pose type used by the kinetree frame tree.
//!
//! A [`RigidPose`] is a proper rigid transformation (a unit quaternion plus a
//! translation over `f64`) with the handful of operations a frame tree needs:
//! composition, inversion, point/vector transformation, and renormalization of
//! the rotation part to bound numerical drift across long composition chains.
//!
//! The [`Transformable`] trait lets geometric values (points, poses, whatever a
//! caller defines) receive a pose application in place without this crate ever
//! inspecting their payload.
//!
//! # Example
//!
//! ```rust
//! use kinetree_pose::{DVec3, RigidPose};
//!
//! let step = RigidPose::from_translation(DVec3::new(1.0, 0.0, 0.0));
//! let lift = RigidPose::from_translation(DVec3::new(0.0, 2.0, 0.0));
//!
//! // `step * lift` applies `lift` first, then `step`.
//! let combined = step * lift;
//! assert_eq!(combined.translation, DVec3::new(1.0, 2.0, 0.0));
//!
//! let p = combined.transform_point(DVec3::ZERO);
//! assert_eq!(p, DVec3::new(1.0, 2.0, 0.0));
//! ```
//!
//! This crate is `no_std`; enable the `libm` feature for builds without `std`.

#![no_std]

pub mod pose;

pub use glam::{DQuat, DVec3};
pub use pose::{PoseError, RigidPose, Transformable};
