use crate::config::{PlaneOrientation, SimulationConfig};
use nalgebra::Vector3;
use ndarray::{Array1, Array2, Array3, Axis};

/// Per-pixel positions of the evaluation plane.
///
/// `relative` is always `positions - sphere_center` and `distance` its norm.
/// Arrays are indexed `[row, column, component]`.
#[derive(Clone, Debug)]
pub struct PositionGrid {
    pub positions: Array3<f64>,
    pub relative: Array3<f64>,
    pub distance: Array2<f64>,
    /// Spacing between neighbouring samples.
    pub pitch: f64,
}

impl PositionGrid {
    /// Samples `[-halfgrid, halfgrid]` with `sim_res` points along both in-plane axes.
    pub fn new(
        sim_res: usize,
        halfgrid: f64,
        orientation: PlaneOrientation,
        plane_position: f64,
        sphere_center: &Vector3<f64>,
    ) -> Self {
        let axis = Array1::linspace(-halfgrid, halfgrid, sim_res);
        let positions = Array3::from_shape_fn([sim_res, sim_res, 3], |(i, j, c)| {
            match (orientation, c) {
                (PlaneOrientation::Horizontal, 0) => axis[j],
                (PlaneOrientation::Horizontal, 1) => axis[i],
                (PlaneOrientation::Horizontal, _) => plane_position,
                (PlaneOrientation::Vertical, 0) => plane_position,
                (PlaneOrientation::Vertical, 1) => axis[j],
                (PlaneOrientation::Vertical, _) => axis[i],
            }
        });

        let center = Array1::from(vec![sphere_center.x, sphere_center.y, sphere_center.z]);
        let relative = &positions - &center;
        let distance = relative.map_axis(Axis(2), |r| r.dot(&r).sqrt());

        let pitch = if sim_res > 1 {
            2.0 * halfgrid / (sim_res - 1) as f64
        } else {
            2.0 * halfgrid
        };

        PositionGrid {
            positions,
            relative,
            distance,
            pitch,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        PositionGrid::new(
            config.sim_res(),
            config.halfgrid(),
            config.orientation,
            config.plane_position,
            &Vector3::from(config.sphere_position),
        )
    }

    /// Number of samples along one side.
    pub fn len(&self) -> usize {
        self.distance.shape()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boolean map of the pixels strictly inside a sphere of `radius`.
    pub fn inside(&self, radius: f64) -> Array2<bool> {
        self.distance.mapv(|r| r < radius)
    }
}
