//! Minimal 3D math for transforms, skinning and animation.
//!
//! Matrices are column-major (`m[column * 4 + row]`), matching the layout of
//! OpenGEX `float[16]` data, and act on column vectors.

use std::ops::{Add, Mul, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);
    pub const ONE: Vector3 = Vector3::new(1.0, 1.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vector3 { x, y, z }
    }

    pub fn dot(self, other: Vector3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; `None` for (near) zero length.
    pub fn normalized(self) -> Option<Vector3> {
        let len = self.length();
        if len <= f32::EPSILON {
            None
        } else {
            Some(self * (1.0 / len))
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        Vector3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        Vector3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Rotation quaternion, `w` is the scalar part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Quaternion { x, y, z, w }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Unit quaternion; a zero quaternion becomes the identity.
    pub fn normalized(self) -> Quaternion {
        let len = self.length();
        if len <= f32::EPSILON {
            return Quaternion::IDENTITY;
        }
        let inv = 1.0 / len;
        Quaternion::new(self.x * inv, self.y * inv, self.z * inv, self.w * inv)
    }

    pub fn to_matrix(self) -> Matrix4 {
        let q = self.normalized();
        let (x, y, z, w) = (q.x, q.y, q.z, q.w);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Matrix4 {
            m: [
                1.0 - 2.0 * (yy + zz),
                2.0 * (xy + wz),
                2.0 * (xz - wy),
                0.0,
                2.0 * (xy - wz),
                1.0 - 2.0 * (xx + zz),
                2.0 * (yz + wx),
                0.0,
                2.0 * (xz + wy),
                2.0 * (yz - wx),
                1.0 - 2.0 * (xx + yy),
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    pub m: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Matrix4::IDENTITY
    }
}

impl Matrix4 {
    pub const IDENTITY: Matrix4 = Matrix4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    pub const fn from_columns(m: [f32; 16]) -> Self {
        Matrix4 { m }
    }

    /// Build from 16 column-major values; `None` for any other length.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let m: [f32; 16] = values.try_into().ok()?;
        Some(Matrix4 { m })
    }

    pub fn get(&self, row: usize, column: usize) -> f32 {
        self.m[column * 4 + row]
    }

    pub fn set(&mut self, row: usize, column: usize, value: f32) {
        self.m[column * 4 + row] = value;
    }

    pub fn translation(v: Vector3) -> Self {
        let mut out = Matrix4::IDENTITY;
        out.m[12] = v.x;
        out.m[13] = v.y;
        out.m[14] = v.z;
        out
    }

    pub fn scale(v: Vector3) -> Self {
        let mut out = Matrix4::IDENTITY;
        out.m[0] = v.x;
        out.m[5] = v.y;
        out.m[10] = v.z;
        out
    }

    pub fn rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Matrix4::IDENTITY;
        out.set(1, 1, c);
        out.set(1, 2, -s);
        out.set(2, 1, s);
        out.set(2, 2, c);
        out
    }

    pub fn rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Matrix4::IDENTITY;
        out.set(0, 0, c);
        out.set(0, 2, s);
        out.set(2, 0, -s);
        out.set(2, 2, c);
        out
    }

    pub fn rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        let mut out = Matrix4::IDENTITY;
        out.set(0, 0, c);
        out.set(0, 1, -s);
        out.set(1, 0, s);
        out.set(1, 1, c);
        out
    }

    /// Rotation by `angle` radians about `axis`. A zero axis yields identity.
    pub fn axis_angle(angle: f32, axis: Vector3) -> Self {
        let Some(a) = axis.normalized() else {
            return Matrix4::IDENTITY;
        };
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        let mut out = Matrix4::IDENTITY;
        out.set(0, 0, t * a.x * a.x + c);
        out.set(0, 1, t * a.x * a.y - s * a.z);
        out.set(0, 2, t * a.x * a.z + s * a.y);
        out.set(1, 0, t * a.x * a.y + s * a.z);
        out.set(1, 1, t * a.y * a.y + c);
        out.set(1, 2, t * a.y * a.z - s * a.x);
        out.set(2, 0, t * a.x * a.z - s * a.y);
        out.set(2, 1, t * a.y * a.z + s * a.x);
        out.set(2, 2, t * a.z * a.z + c);
        out
    }

    pub fn transpose(&self) -> Matrix4 {
        let mut out = Matrix4::IDENTITY;
        for row in 0..4 {
            for column in 0..4 {
                out.set(row, column, self.get(column, row));
            }
        }
        out
    }

    pub fn transform_point(&self, p: Vector3) -> Vector3 {
        Vector3::new(
            self.get(0, 0) * p.x + self.get(0, 1) * p.y + self.get(0, 2) * p.z + self.get(0, 3),
            self.get(1, 0) * p.x + self.get(1, 1) * p.y + self.get(1, 2) * p.z + self.get(1, 3),
            self.get(2, 0) * p.x + self.get(2, 1) * p.y + self.get(2, 2) * p.z + self.get(2, 3),
        )
    }

    pub fn transform_vector(&self, v: Vector3) -> Vector3 {
        Vector3::new(
            self.get(0, 0) * v.x + self.get(0, 1) * v.y + self.get(0, 2) * v.z,
            self.get(1, 0) * v.x + self.get(1, 1) * v.y + self.get(1, 2) * v.z,
            self.get(2, 0) * v.x + self.get(2, 1) * v.y + self.get(2, 2) * v.z,
        )
    }

    /// General inverse; `None` when the matrix is singular.
    pub fn inverse(&self) -> Option<Matrix4> {
        let m = &self.m;
        let mut inv = [0.0f32; 16];

        inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
            + m[9] * m[7] * m[14]
            + m[13] * m[6] * m[11]
            - m[13] * m[7] * m[10];
        inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
            - m[8] * m[7] * m[14]
            - m[12] * m[6] * m[11]
            + m[12] * m[7] * m[10];
        inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
            + m[8] * m[7] * m[13]
            + m[12] * m[5] * m[11]
            - m[12] * m[7] * m[9];
        inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
            - m[8] * m[6] * m[13]
            - m[12] * m[5] * m[10]
            + m[12] * m[6] * m[9];
        inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
            - m[9] * m[3] * m[14]
            - m[13] * m[2] * m[11]
            + m[13] * m[3] * m[10];
        inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
            + m[8] * m[3] * m[14]
            + m[12] * m[2] * m[11]
            - m[12] * m[3] * m[10];
        inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
            - m[8] * m[3] * m[13]
            - m[12] * m[1] * m[11]
            + m[12] * m[3] * m[9];
        inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
            + m[8] * m[2] * m[13]
            + m[12] * m[1] * m[10]
            - m[12] * m[2] * m[9];
        inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
            + m[5] * m[3] * m[14]
            + m[13] * m[2] * m[7]
            - m[13] * m[3] * m[6];
        inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
            - m[4] * m[3] * m[14]
            - m[12] * m[2] * m[7]
            + m[12] * m[3] * m[6];
        inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
            + m[4] * m[3] * m[13]
            + m[12] * m[1] * m[7]
            - m[12] * m[3] * m[5];
        inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
            - m[4] * m[2] * m[13]
            - m[12] * m[1] * m[6]
            + m[12] * m[2] * m[5];
        inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
            - m[5] * m[3] * m[10]
            - m[9] * m[2] * m[7]
            + m[9] * m[3] * m[6];
        inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
            + m[4] * m[3] * m[10]
            + m[8] * m[2] * m[7]
            - m[8] * m[3] * m[6];
        inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
            - m[4] * m[3] * m[9]
            - m[8] * m[1] * m[7]
            + m[8] * m[3] * m[5];
        inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
            + m[4] * m[2] * m[9]
            + m[8] * m[1] * m[6]
            - m[8] * m[2] * m[5];

        let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
        if det.abs() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        for value in inv.iter_mut() {
            *value *= inv_det;
        }
        Some(Matrix4 { m: inv })
    }

    pub fn approx_eq(&self, other: &Matrix4, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix4 {
    type Output = Matrix4;

    fn mul(self, rhs: Matrix4) -> Matrix4 {
        let mut out = [0.0f32; 16];
        for column in 0..4 {
            for row in 0..4 {
                out[column * 4 + row] = (0..4).map(|k| self.get(row, k) * rhs.get(k, column)).sum();
            }
        }
        Matrix4 { m: out }
    }
}
