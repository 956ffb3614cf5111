use ash::vk;
use glam::Vec3;

/// Affine transform as 3 rows of 4 floats, the implicit last row is
/// `(0, 0, 0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform4x3 {
    pub rows: [[f32; 4]; 3],
}

impl Default for Transform4x3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform4x3 {
    pub const IDENTITY: Self = Self {
        rows: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    pub fn translation(&self) -> Vec3 {
        Vec3::new(self.rows[0][3], self.rows[1][3], self.rows[2][3])
    }

    /// Applies the linear part to `v`, reading the rows as row-major.
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let row = |i: usize| Vec3::new(self.rows[i][0], self.rows[i][1], self.rows[i][2]);
        Vec3::new(row(0).dot(v), row(1).dot(v), row(2).dot(v))
    }

    pub fn to_vk(&self) -> vk::TransformMatrixKHR {
        let mut matrix = [0.0; 12];
        for (dst, row) in matrix.chunks_exact_mut(4).zip(self.rows.iter()) {
            dst.copy_from_slice(row);
        }
        vk::TransformMatrixKHR { matrix }
    }
}

/// Basis vectors plus translation, mutated step by step while composing.
struct Frame {
    x_axis: Vec3,
    y_axis: Vec3,
    z_axis: Vec3,
    translation: Vec3,
}

impl Frame {
    fn identity() -> Self {
        Self {
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
            z_axis: Vec3::Z,
            translation: Vec3::ZERO,
        }
    }

    fn translate(&mut self, t: Vec3) {
        self.translation += self.x_axis * t.x + self.y_axis * t.y + self.z_axis * t.z;
    }

    fn rotate_x(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        let (y, z) = (self.y_axis, self.z_axis);
        self.y_axis = y * c + z * s;
        self.z_axis = z * c - y * s;
    }

    fn rotate_y(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        let (x, z) = (self.x_axis, self.z_axis);
        self.x_axis = x * c - z * s;
        self.z_axis = x * s + z * c;
    }

    fn rotate_z(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        let (x, y) = (self.x_axis, self.y_axis);
        self.x_axis = x * c + y * s;
        self.y_axis = y * c - x * s;
    }

    fn scale(&mut self, s: Vec3) {
        self.x_axis *= s.x;
        self.y_axis *= s.y;
        self.z_axis *= s.z;
    }

    /// Row `i` holds basis vector `i` followed by translation component `i`.
    fn into_4x3(self) -> Transform4x3 {
        let t = self.translation;
        Transform4x3 {
            rows: [
                self.x_axis.extend(t.x).to_array(),
                self.y_axis.extend(t.y).to_array(),
                self.z_axis.extend(t.z).to_array(),
            ],
        }
    }
}

/// Composes translation, rotation and scale into a 4x3 transform.
///
/// Translation is applied first under the identity basis, then the basis is
/// rotated around X, Y and Z in that order, then each basis vector is scaled.
/// Scale and rotation never touch the translation.
pub fn compose(translation: Option<Vec3>, rotation: Option<Vec3>, scale: Option<Vec3>) -> Transform4x3 {
    let mut frame = Frame::identity();
    if let Some(t) = translation {
        frame.translate(t);
    }
    if let Some(r) = rotation {
        frame.rotate_x(r.x);
        frame.rotate_y(r.y);
        frame.rotate_z(r.z);
    }
    if let Some(s) = scale {
        frame.scale(s);
    }
    frame.into_4x3()
}
