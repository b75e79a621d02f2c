use glam::{IVec3, Vec3};

/// Extra distance added to every push-out so the corrected box ends up just
/// clear of the block face instead of touching it.
pub const COLLISION_CORRECTION_MARGIN: f32 = 0.001;
pub const NUMBER_OF_BOUNDING_POINTS: usize = 12;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_centre(centre: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: centre - half_extents,
            max: centre + half_extents,
        }
    }

    /// Unit cube occupied by the block at integer coordinates `block`.
    pub fn block(block: IVec3) -> Self {
        let min = block.as_vec3();
        Self {
            min,
            max: min + Vec3::ONE,
        }
    }

    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Smallest single-axis translation that moves `self` out of `obstacle`,
    /// including the correction margin. Zero when they do not overlap.
    pub fn shortest_correction(&self, obstacle: &AABB) -> Vec3 {
        if !self.intersects(obstacle) {
            return Vec3::ZERO;
        }

        let candidates = [
            (obstacle.max.x - self.min.x, Vec3::X),
            (self.max.x - obstacle.min.x, Vec3::NEG_X),
            (obstacle.max.y - self.min.y, Vec3::Y),
            (self.max.y - obstacle.min.y, Vec3::NEG_Y),
            (obstacle.max.z - self.min.z, Vec3::Z),
            (self.max.z - obstacle.min.z, Vec3::NEG_Z),
        ];

        let mut best: Option<(f32, Vec3)> = None;
        for (distance, direction) in candidates {
            if distance <= 0.0 {
                continue;
            }
            if best.map_or(true, |(shortest, _)| distance < shortest) {
                best = Some((distance, direction));
            }
        }

        best.map_or(Vec3::ZERO, |(distance, direction)| {
            direction * (distance + COLLISION_CORRECTION_MARGIN)
        })
    }

    /// Integer coordinates of every block cell the box overlaps.
    pub fn overlapped_blocks(&self) -> impl Iterator<Item = IVec3> {
        let min = self.min.floor().as_ivec3();
        let max = (self.max.ceil().as_ivec3() - IVec3::ONE).max(min);
        (min.z..=max.z).flat_map(move |z| {
            (min.y..=max.y).flat_map(move |y| (min.x..=max.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}

/// The twelve collision sample points of a box: bottom, middle and top
/// layers, each with the south-west, south-east, north-east and north-west
/// corners.
pub fn bounding_points(centre: Vec3, half_extents: Vec3) -> [Vec3; NUMBER_OF_BOUNDING_POINTS] {
    let corners = [
        Vec3::new(-half_extents.x, -half_extents.y, 0.0),
        Vec3::new(half_extents.x, -half_extents.y, 0.0),
        Vec3::new(half_extents.x, half_extents.y, 0.0),
        Vec3::new(-half_extents.x, half_extents.y, 0.0),
    ];
    let layers = [-half_extents.z, 0.0, half_extents.z];

    let mut points = [Vec3::ZERO; NUMBER_OF_BOUNDING_POINTS];
    for (layer_index, layer) in layers.iter().enumerate() {
        for (corner_index, corner) in corners.iter().enumerate() {
            points[layer_index * corners.len() + corner_index] =
                centre + *corner + Vec3::new(0.0, 0.0, *layer);
        }
    }
    points
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::PosX,
        Face::NegX,
        Face::PosY,
        Face::NegY,
        Face::PosZ,
        Face::NegZ,
    ];

    pub fn normal_ivec3(&self) -> IVec3 {
        match self {
            Face::PosX => IVec3::X,
            Face::NegX => IVec3::NEG_X,
            Face::PosY => IVec3::Y,
            Face::NegY => IVec3::NEG_Y,
            Face::PosZ => IVec3::Z,
            Face::NegZ => IVec3::NEG_Z,
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal_ivec3().as_vec3()
    }

    pub fn axis(&self) -> Axis {
        match self {
            Face::PosX | Face::NegX => Axis::X,
            Face::PosY | Face::NegY => Axis::Y,
            Face::PosZ | Face::NegZ => Axis::Z,
        }
    }

    /// Face pointing along `axis` in the direction of `sign`.
    pub fn from_axis(axis: Axis, sign: i32) -> Self {
        match (axis, sign > 0) {
            (Axis::X, true) => Face::PosX,
            (Axis::X, false) => Face::NegX,
            (Axis::Y, true) => Face::PosY,
            (Axis::Y, false) => Face::NegY,
            (Axis::Z, true) => Face::PosZ,
            (Axis::Z, false) => Face::NegZ,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// One grid-plane crossing along a segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Crossing {
    pub axis: Axis,
    /// +1 or -1, the direction the traversal moves along `axis`.
    pub step: i32,
    /// Parametric position of the crossing along the segment, in `[0, 1]`.
    pub fraction: f32,
}

impl Crossing {
    /// Face of the newly entered block that the segment passes through.
    pub fn entry_face(&self) -> Face {
        Face::from_axis(self.axis, -self.step)
    }
}

/// Amortized voxel traversal over the segment `start..start + displacement`.
/// Yields every block-boundary crossing in order until the end of the segment.
#[derive(Debug, Copy, Clone)]
pub struct SegmentTraversal {
    step: IVec3,
    t_max: Vec3,
    t_delta: Vec3,
}

impl SegmentTraversal {
    pub fn new(start: Vec3, displacement: Vec3) -> Self {
        let step = IVec3::new(
            if displacement.x > 0.0 { 1 } else { -1 },
            if displacement.y > 0.0 { 1 } else { -1 },
            if displacement.z > 0.0 { 1 } else { -1 },
        );

        let t_delta = Vec3::new(
            inverse_magnitude(displacement.x),
            inverse_magnitude(displacement.y),
            inverse_magnitude(displacement.z),
        );

        let first_crossing = |origin: f32, delta: f32, step: i32, t_delta: f32| {
            if delta == 0.0 {
                return f32::MAX;
            }
            let boundary = origin.floor() + ((step + 1) / 2) as f32;
            (boundary - origin).abs() * t_delta
        };
        let t_max = Vec3::new(
            first_crossing(start.x, displacement.x, step.x, t_delta.x),
            first_crossing(start.y, displacement.y, step.y, t_delta.y),
            first_crossing(start.z, displacement.z, step.z, t_delta.z),
        );

        Self {
            step,
            t_max,
            t_delta,
        }
    }
}

fn inverse_magnitude(component: f32) -> f32 {
    if component == 0.0 {
        f32::MAX
    } else {
        (1.0 / component).abs()
    }
}

impl Iterator for SegmentTraversal {
    type Item = Crossing;

    fn next(&mut self) -> Option<Self::Item> {
        let axis = if self.t_max.x <= self.t_max.y && self.t_max.x <= self.t_max.z {
            Axis::X
        } else if self.t_max.y <= self.t_max.z {
            Axis::Y
        } else {
            Axis::Z
        };

        let index = axis.index();
        let fraction = self.t_max[index];
        if !fraction.is_finite() || fraction > 1.0 {
            return None;
        }

        self.t_max[index] += self.t_delta[index];
        Some(Crossing {
            axis,
            step: self.step[index],
            fraction,
        })
    }
}
