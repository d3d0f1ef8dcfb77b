// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Image-plane math used by the metric evaluator.
//!
//! Landmarks arrive in normalized image coordinates: `x` grows to the right,
//! `y` grows *downwards*. Angles returned by this module are in **degrees**,
//! since every threshold in the rule engines is expressed in degrees.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-6;

/// The factor to convert radians to degrees (180.0 / PI).
pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

pub mod vector;

pub use self::vector::Vec2;

/// Converts an angle from radians to degrees.
///
/// # Examples
///
/// ```
/// use reconnect_core::math::radians_to_degrees;
/// assert_eq!(radians_to_degrees(std::f32::consts::PI), 180.0);
/// ```
#[inline]
pub fn radians_to_degrees(radians: f32) -> f32 {
    radians * RAD_TO_DEG
}

/// Rounds a value to one decimal place, the precision used for history and diagnostics.
#[inline]
pub fn round1(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
