use glam::{Mat4, Vec3, Vec4};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        AABB { min, max }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Conservative plane test. The box is inflated by `margin` on every side and
    /// rejected only if its positive vertex lies behind one of the planes.
    pub fn is_visible(&self, frustum_planes: &[Vec4; 6], margin: f32) -> bool {
        let expanded_min = self.min - Vec3::splat(margin);
        let expanded_max = self.max + Vec3::splat(margin);

        for plane in frustum_planes {
            let p = Vec3::new(
                if plane.x > 0.0 {
                    expanded_max.x
                } else {
                    expanded_min.x
                },
                if plane.y > 0.0 {
                    expanded_max.y
                } else {
                    expanded_min.y
                },
                if plane.z > 0.0 {
                    expanded_max.z
                } else {
                    expanded_min.z
                },
            );
            if plane.truncate().dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Extracts left, right, bottom, top, near and far planes from a combined
/// projection * view matrix. `dot(plane.xyz, p) + plane.w >= 0` is inside.
///
/// Near uses `row3 + row2`, which is the exact near plane for a [-1, 1] depth
/// range and lies slightly behind it for WGPU's [0, 1] range. Both are
/// conservative.
pub fn extract_frustum_planes(view_proj: &Mat4) -> [Vec4; 6] {
    let r0 = view_proj.row(0);
    let r1 = view_proj.row(1);
    let r2 = view_proj.row(2);
    let r3 = view_proj.row(3);

    let mut planes = [
        // Left
        r3 + r0,
        // Right
        r3 - r0,
        // Bottom
        r3 + r1,
        // Top
        r3 - r1,
        // Near
        r3 + r2,
        // Far
        r3 - r2,
    ];

    // Normalize planes so that distances are in world units
    for plane in &mut planes {
        let length = plane.truncate().length();
        if length > 0.0 {
            *plane /= length;
        }
    }

    planes
}

/// The six planes of a view volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const BOTTOM: usize = 2;
    pub const TOP: usize = 3;
    pub const NEAR: usize = 4;
    pub const FAR: usize = 5;

    pub fn from_matrices(view: &Mat4, proj: &Mat4) -> Self {
        Self {
            planes: extract_frustum_planes(&(*proj * *view)),
        }
    }

    pub fn intersects(&self, aabb: &AABB, margin: f32) -> bool {
        aabb.is_visible(&self.planes, margin)
    }
}

struct CachedFrustum {
    view: Mat4,
    proj: Mat4,
    frustum: Frustum,
}

/// Frustum tester that keeps the last extracted planes while the camera
/// matrices stay within `epsilon` of the ones that produced them.
pub struct FrustumCuller {
    epsilon: f32,
    margin: f32,
    cached: Option<CachedFrustum>,
    extractions: u64,
}

impl FrustumCuller {
    pub fn new(epsilon: f32, margin: f32) -> Self {
        Self {
            epsilon,
            margin,
            cached: None,
            extractions: 0,
        }
    }

    /// Returns the frustum for the given matrices, re-extracting planes only
    /// if either matrix moved by more than `epsilon` in any element.
    pub fn update(&mut self, view: &Mat4, proj: &Mat4) -> &Frustum {
        let stale = match &self.cached {
            Some(cached) => {
                !cached.view.abs_diff_eq(*view, self.epsilon)
                    || !cached.proj.abs_diff_eq(*proj, self.epsilon)
            }
            None => true,
        };

        if stale {
            self.extractions += 1;
            tracing::trace!(extractions = self.extractions, "Re-extracting frustum planes");
        }

        let cached = match self.cached.take() {
            Some(cached) if !stale => cached,
            _ => CachedFrustum {
                view: *view,
                proj: *proj,
                frustum: Frustum::from_matrices(view, proj),
            },
        };
        &self.cached.insert(cached).frustum
    }

    /// Current frustum, if `update` has been called.
    pub fn frustum(&self) -> Option<&Frustum> {
        self.cached.as_ref().map(|c| &c.frustum)
    }

    /// Tests a box against the current frustum. Without a frustum every box passes.
    pub fn is_visible(&self, aabb: &AABB) -> bool {
        match &self.cached {
            Some(cached) => cached.frustum.intersects(aabb, self.margin),
            None => true,
        }
    }

    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Number of plane extractions performed so far.
    pub fn extractions(&self) -> u64 {
        self.extractions
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}
