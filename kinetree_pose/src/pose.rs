// Copyright 2025 the Kinetree Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rigid pose type: composition, inversion, and rotation renormalization.

use core::ops::Mul;

use glam::{DQuat, DVec3};
use thiserror::Error;

/// Smallest quaternion norm still accepted as repairable by
/// [`RigidPose::renormalized`].
const MIN_ROTATION_NORM: f64 = 1.0e-7;

/// Numerical failure of a pose's rotation part.
#[derive(Copy, Clone, Debug, PartialEq, Error)]
pub enum PoseError {
    /// The quaternion's norm is non-finite or too close to zero to renormalize.
    #[error("quaternion norm {norm} cannot be renormalized to a rotation")]
    NotARotation {
        /// The offending norm.
        norm: f64,
    },
}

/// A rigid transformation: rotation (unit quaternion) followed by translation.
///
/// Composition uses the usual convention: `(a * b).transform_point(p)` equals
/// `a.transform_point(b.transform_point(p))`.
///
/// The rotation is expected to stay (close to) unit length. Constructors do
/// not enforce this; chains of compositions drift, which is why consumers
/// re-orthonormalize via [`Self::renormalized`] at well-chosen points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RigidPose {
    /// Rotation part, expected near unit norm.
    pub rotation: DQuat,
    /// Translation part, applied after the rotation.
    pub translation: DVec3,
}

impl Default for RigidPose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        rotation: DQuat::IDENTITY,
        translation: DVec3::ZERO,
    };

    /// Creates a pose from a rotation and a translation.
    pub const fn new(rotation: DQuat, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Creates a pure translation.
    pub const fn from_translation(translation: DVec3) -> Self {
        Self {
            rotation: DQuat::IDENTITY,
            translation,
        }
    }

    /// Creates a pure rotation.
    pub const fn from_rotation(rotation: DQuat) -> Self {
        Self {
            rotation,
            translation: DVec3::ZERO,
        }
    }

    /// Applies this pose to a point.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Applies only the rotation part, for direction-like quantities.
    pub fn transform_vector(&self, vector: DVec3) -> DVec3 {
        self.rotation * vector
    }

    /// The inverse pose.
    ///
    /// Uses the conjugate for the rotation, which is exact for unit
    /// quaternions.
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.conjugate();
        Self {
            rotation: inv_rotation,
            translation: -(inv_rotation * self.translation),
        }
    }

    /// Norm of the rotation quaternion.
    pub fn rotation_norm(&self) -> f64 {
        self.rotation.length()
    }

    /// Returns this pose with the rotation scaled back to unit norm.
    ///
    /// Fails when the norm is non-finite or vanishingly small, i.e. when no
    /// nearby rotation exists to repair towards.
    pub fn renormalized(self) -> Result<Self, PoseError> {
        let norm = self.rotation.length();
        if !norm.is_finite() || norm < MIN_ROTATION_NORM {
            return Err(PoseError::NotARotation { norm });
        }
        Ok(Self {
            rotation: self.rotation * (1.0 / norm),
            translation: self.translation,
        })
    }

    /// True when the rotation is (within `tol`) about the z-axis only.
    ///
    /// Used to decide whether a child of a z-up frame is itself z-up.
    pub fn is_rotation_about_z(&self, tol: f64) -> bool {
        self.rotation.x.abs() <= tol && self.rotation.y.abs() <= tol
    }

    /// Approximate equality: rotations compared up to sign, translations by
    /// Euclidean distance.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        let rot_aligned = 1.0 - self.rotation.dot(other.rotation).abs() <= tol;
        rot_aligned && (self.translation - other.translation).length() <= tol
    }
}

impl Mul for RigidPose {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            rotation: self.rotation * rhs.rotation,
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

/// A value that can receive a pose application in place.
///
/// Implementations decide what "applying a pose" means for their payload; the
/// frame tree only ever calls these two methods and never inspects the value.
pub trait Transformable {
    /// Applies `pose` to `self`.
    fn apply_pose(&mut self, pose: &RigidPose);

    /// Applies the inverse of `pose` to `self`.
    fn apply_inverse_pose(&mut self, pose: &RigidPose);
}

impl Transformable for DVec3 {
    fn apply_pose(&mut self, pose: &RigidPose) {
        *self = pose.transform_point(*self);
    }

    fn apply_inverse_pose(&mut self, pose: &RigidPose) {
        let inv_rotation = pose.rotation.conjugate();
        *self = inv_rotation * (*self - pose.translation);
    }
}

impl Transformable for RigidPose {
    fn apply_pose(&mut self, pose: &RigidPose) {
        *self = *pose * *self;
    }

    fn apply_inverse_pose(&mut self, pose: &RigidPose) {
        *self = pose.inverse() * *self;
    }
}
