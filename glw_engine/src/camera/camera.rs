/// Camera - view recipe, CAD orbit state and input handlers
///
/// A camera turns its parameters into one view matrix per frame
/// (`calculate_matrix`). The meshes it renders are kept by the scene's
/// camera/mesh relation table, not by the camera itself.

use glam::{Mat3, Mat4, Vec3};
use crate::scene::FrameKey;
use crate::window::{CameraEventHandler, HandlerId};

/// Margin factor applied by `fit_box`: the largest box extent spans 1.5 units
pub const AUTOFIT_MARGIN: f32 = 1.5;

/// One extent dominates another when it is this many times larger
const DOMINANCE: f32 = 10.0;

/// How a camera builds its view matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewRecipe {
    /// Identity (vertices already in clip space)
    Screen,
    /// Pixel coordinates, origin at the top-left corner
    Blit,
    /// Orbit around `eye` with zoom, rotation angles and clip planes
    Cad,
    /// CAD rotations only (orientation gizmo)
    Axis,
    /// Look from `eye` towards `target`
    LookAt,
}

/// Camera state
pub struct Camera {
    label: String,
    recipe: ViewRecipe,
    perspective: bool,
    screen_ratio: bool,
    active: bool,
    eye: Vec3,
    /// Degrees: x about Z, y about -Y, z about X
    angles: Vec3,
    scale: Vec3,
    zoom: f32,
    far: f32,
    near: f32,
    field_angle: f32,
    target: Vec3,
    up: Vec3,
    angle_rounding: f32,
    boundary_frame: Option<FrameKey>,
    view_matrix: Mat4,
    handlers: Vec<(HandlerId, Box<dyn CameraEventHandler>)>,
}

impl Camera {
    pub fn new(recipe: ViewRecipe) -> Self {
        Self {
            label: String::new(),
            recipe,
            perspective: false,
            screen_ratio: true,
            active: true,
            eye: Vec3::ZERO,
            angles: Vec3::ZERO,
            scale: Vec3::ONE,
            zoom: 1.0,
            far: 10.0,
            near: 0.001,
            field_angle: 45.0,
            target: Vec3::ZERO,
            up: Vec3::Z,
            angle_rounding: 5.0,
            boundary_frame: None,
            view_matrix: Mat4::IDENTITY,
            handlers: Vec::new(),
        }
    }

    pub fn cad() -> Self {
        Self::new(ViewRecipe::Cad)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_perspective(mut self, perspective: bool) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_screen_ratio(mut self, screen_ratio: bool) -> Self {
        self.screen_ratio = screen_ratio;
        self
    }

    // ===== GETTERS =====

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn recipe(&self) -> ViewRecipe {
        self.recipe
    }

    pub fn perspective(&self) -> bool {
        self.perspective
    }

    /// Whether x is scaled by height/width to keep square pixels
    pub fn screen_ratio(&self) -> bool {
        self.screen_ratio
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Orbit centre (CAD) or eye position (look-at)
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn angles(&self) -> Vec3 {
        self.angles
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    pub fn near(&self) -> f32 {
        self.near
    }

    pub fn field_angle(&self) -> f32 {
        self.field_angle
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn angle_rounding(&self) -> f32 {
        self.angle_rounding
    }

    /// Frame whose area receives this camera's input, `None` for anywhere
    pub fn boundary_frame(&self) -> Option<FrameKey> {
        self.boundary_frame
    }

    /// View matrix computed at the start of the current render cycle
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    // ===== SETTERS =====

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn set_recipe(&mut self, recipe: ViewRecipe) {
        self.recipe = recipe;
    }

    pub fn set_perspective(&mut self, perspective: bool) {
        self.perspective = perspective;
    }

    pub fn set_screen_ratio(&mut self, screen_ratio: bool) {
        self.screen_ratio = screen_ratio;
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
    }

    pub fn set_angles(&mut self, angles: Vec3) {
        self.angles = angles;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = zoom;
    }

    pub fn set_clip(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    pub fn set_field_angle(&mut self, degrees: f32) {
        self.field_angle = degrees;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_up(&mut self, up: Vec3) {
        self.up = up;
    }

    /// Step used by `round_angles`; 0 disables rounding
    pub fn set_angle_rounding(&mut self, step: f32) {
        self.angle_rounding = step;
    }

    pub fn set_boundary_frame(&mut self, frame: Option<FrameKey>) {
        self.boundary_frame = frame;
    }

    // ===== MATRICES =====

    fn rotation(&self) -> Mat4 {
        Mat4::from_rotation_x(self.angles.z.to_radians())
            * Mat4::from_rotation_z(self.angles.x.to_radians())
            * Mat4::from_rotation_y(-self.angles.y.to_radians())
    }

    fn cad_scale(&self) -> Vec3 {
        Vec3::new(
            self.zoom * self.scale.x,
            self.zoom * self.scale.y,
            self.zoom * self.scale.z / self.far,
        )
    }

    fn cad_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, 0.0, -self.near))
            * Mat4::from_scale(self.cad_scale())
            * self.rotation()
            * Mat4::from_translation(-self.eye)
    }

    /// Pixel `(0, 0)` lands on the top-left corner and `(width, height)` on the bottom-right
    fn blit_matrix(width: f32, height: f32) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        matrix.x_axis.x = 2.0 / height;
        matrix.y_axis.y = -2.0 / height;
        matrix.z_axis.z = 0.999;
        matrix.w_axis.x = -width / height;
        matrix.w_axis.y = 1.0;
        matrix
    }

    /// View matrix for a viewport of `width` x `height` pixels
    ///
    /// The recipe matrix is followed by the perspective frustum when
    /// enabled, then by the height/width x scale unless the screen ratio
    /// correction is disabled.
    pub fn calculate_matrix(&self, width: u32, height: u32) -> Mat4 {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let mut matrix = match self.recipe {
            ViewRecipe::Screen => Mat4::IDENTITY,
            ViewRecipe::Blit => Self::blit_matrix(w, h),
            ViewRecipe::Cad => self.cad_matrix(),
            ViewRecipe::Axis => self.rotation(),
            ViewRecipe::LookAt => Mat4::look_at_rh(self.eye, self.target, self.up),
        };
        if self.perspective {
            matrix = Mat4::perspective_rh_gl(self.field_angle.to_radians(), 1.0, self.near, self.far) * matrix;
        }
        if self.screen_ratio {
            matrix = Mat4::from_scale(Vec3::new(h / w, 1.0, 1.0)) * matrix;
        }
        matrix
    }

    /// Recompute and store the view matrix
    pub fn update_view(&mut self, width: u32, height: u32) -> Mat4 {
        self.view_matrix = self.calculate_matrix(width, height);
        self.view_matrix
    }

    /// World-space displacement producing a view-space displacement `delta`
    ///
    /// Inverse of the CAD scale and rotation; screen deltas are expected
    /// in units of half the viewport height.
    pub fn cad_displacement(&self, delta: Vec3) -> Vec3 {
        let linear = Mat3::from_mat4(Mat4::from_scale(self.cad_scale()) * self.rotation());
        if linear.determinant().abs() <= f32::EPSILON {
            return Vec3::ZERO;
        }
        linear.inverse() * delta
    }

    // ===== CAD HELPERS =====

    /// Snap every angle to the nearest multiple of the rounding step
    pub fn round_angles(&mut self) {
        let step = self.angle_rounding;
        if step > 0.0 {
            self.angles = (self.angles / step).round() * step;
        }
    }

    /// Orbit by screen pixels
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.angles.x -= dx;
        self.angles.z += dy;
    }

    /// Move the orbit centre by a view-space displacement
    pub fn translate_view(&mut self, delta: Vec3) {
        self.eye += self.cad_displacement(delta);
    }

    /// Multiply the zoom
    pub fn zoom_by(&mut self, factor: f32) {
        self.zoom *= factor;
    }

    /// Bring a view-space point to the viewport centre
    pub fn center_on(&mut self, view_point: Vec3) {
        self.translate_view(view_point);
    }

    /// Centre on a view-space point then magnify the zoom
    pub fn zoom_box(&mut self, view_centre: Vec3, magnification: f32) {
        self.center_on(view_centre);
        if magnification.is_finite() && magnification > 0.0 {
            self.zoom_by(magnification);
        }
    }

    /// Orient and zoom so an axis-aligned box fills the view
    ///
    /// When two extents are each ten times the third, the view looks down
    /// the thin axis; otherwise the default 3D orientation is used. The
    /// orbit centre moves to the box centre. The fitted size starts at 1,
    /// becomes the x extent when that is not degenerate, and grows to a
    /// larger non-degenerate y or z extent; it is mapped to [`AUTOFIT_MARGIN`].
    pub fn fit_box(&mut self, min: Vec3, max: Vec3) {
        let extent = max - min;
        self.angles = if extent.x > DOMINANCE * extent.y && extent.z > DOMINANCE * extent.y {
            Vec3::new(0.0, 180.0, 90.0)
        } else if extent.y > DOMINANCE * extent.x && extent.z > DOMINANCE * extent.x {
            Vec3::new(0.0, 90.0, 0.0)
        } else if extent.x > DOMINANCE * extent.z && extent.y > DOMINANCE * extent.z {
            Vec3::new(90.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 180.0, 90.0)
        };

        self.eye = (max + min) / 2.0;
        let mut size = 1.0;
        if extent.x != 0.0 {
            size = extent.x;
        }
        for e in [extent.y, extent.z] {
            if e != 0.0 && size < e {
                size = e;
            }
        }
        self.zoom = AUTOFIT_MARGIN / size;
    }

    // ===== HANDLERS =====

    pub fn add_handler(&mut self, handler: impl CameraEventHandler + 'static) -> HandlerId {
        let id = HandlerId::next();
        self.handlers.push((id, Box::new(handler)));
        id
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(h, _)| *h != id);
        self.handlers.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn take_handlers(&mut self) -> Vec<(HandlerId, Box<dyn CameraEventHandler>)> {
        std::mem::take(&mut self.handlers)
    }

    pub(crate) fn restore_handlers(&mut self, mut handlers: Vec<(HandlerId, Box<dyn CameraEventHandler>)>) {
        handlers.append(&mut self.handlers);
        self.handlers = handlers;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::cad()
    }
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera")
            .field("label", &self.label)
            .field("recipe", &self.recipe)
            .field("active", &self.active)
            .field("eye", &self.eye)
            .field("angles", &self.angles)
            .field("zoom", &self.zoom)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "camera_tests.rs"]
mod tests;
