//! Chromium-backed content surfaces
//!
//! This module launches a browser through ChromiumOxide and exposes its pages
//! as [`ContentSurface`](crate::bridge::ContentSurface)s.

pub mod controller;
pub mod surface;

pub use controller::{BrowserController, SurfaceConfig, SurfaceConfigBuilder};
pub use surface::ChromiumSurface;
