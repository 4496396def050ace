//! Cameras: view recipes, CAD navigation and autofit

mod camera;
mod cad_controller;

pub use camera::{Camera, ViewRecipe, AUTOFIT_MARGIN};
pub use cad_controller::{CadController, SCROLL_ZOOM_STEP, SQUARE_ZOOM_MIN};
