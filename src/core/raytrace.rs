use crate::types::{GeoError, GeoReal, GeoResult, PropertyArray};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Straight ray between two points in grid coordinates `(x, z)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    pub x0: f64,
    pub z0: f64,
    pub x1: f64,
    pub z1: f64,
}

impl Ray {
    pub fn new(x0: f64, z0: f64, x1: f64, z1: f64) -> Self {
        Self { x0, z0, x1, z1 }
    }

    /// Euclidean length in grid units
    pub fn length(&self) -> f64 {
        (self.x1 - self.x0).hypot(self.z1 - self.z0)
    }

    fn is_finite(&self) -> bool {
        [self.x0, self.z0, self.x1, self.z1]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Samples model properties along straight rays.
///
/// A ray is parametrized uniformly over `[0, 1)` in `nump` steps, so the end
/// point itself is never sampled. Each continuous coordinate is rounded up to
/// the next grid index on both axes.
pub struct RaySampler {
    nump: usize,
}

impl RaySampler {
    pub fn new(nump: usize) -> Self {
        Self { nump }
    }

    pub fn nump(&self) -> usize {
        self.nump
    }

    /// Path length per sample when the ray is divided evenly
    pub fn uniform_step(&self, ray: &Ray) -> f64 {
        ray.length() / self.nump as f64
    }

    /// Grid indices visited by `ray` on a grid of shape `dims`
    pub fn sample_indices(&self, ray: &Ray, dims: (usize, usize)) -> GeoResult<Vec<(usize, usize)>> {
        if self.nump == 0 {
            return Err(GeoError::Configuration(
                "Ray sample count must be positive".to_string(),
            ));
        }
        if !ray.is_finite() {
            return Err(GeoError::Configuration(format!(
                "Ray endpoints must be finite: {:?}",
                ray
            )));
        }

        let (nx, nz) = dims;
        let step_x = (ray.x1 - ray.x0) / self.nump as f64;
        let step_z = (ray.z1 - ray.z0) / self.nump as f64;

        (0..self.nump)
            .map(|i| {
                let ix = grid_index(ray.x0 + i as f64 * step_x, nx, "x")?;
                let iz = grid_index(ray.z0 + i as f64 * step_z, nz, "z")?;
                Ok((ix, iz))
            })
            .collect()
    }

    /// Property values sampled along `ray`
    pub fn find_points(&self, ray: &Ray, property: &PropertyArray) -> GeoResult<Array1<GeoReal>> {
        let indices = self.sample_indices(ray, property.dim())?;
        Ok(indices.into_iter().map(|(ix, iz)| property[[ix, iz]]).collect())
    }

    /// Travel time along `ray`: the sum of `ds / v` over the sampled points
    pub fn traveltime(&self, ray: &Ray, velocity: &PropertyArray, ds: f64) -> GeoResult<f64> {
        if !(ds > 0.0 && ds.is_finite()) {
            return Err(GeoError::Configuration(format!(
                "Path step must be positive, got {}",
                ds
            )));
        }

        let mut time = 0.0;
        for (ix, iz) in self.sample_indices(ray, velocity.dim())? {
            let v = velocity[[ix, iz]] as f64;
            if !(v > 0.0 && v.is_finite()) {
                return Err(GeoError::InvalidData(format!(
                    "Velocity {} at ({}, {}) is not positive",
                    v, ix, iz
                )));
            }
            time += ds / v;
        }
        Ok(time)
    }

    /// Travel times for many rays through the same velocity field
    pub fn traveltimes(&self, rays: &[Ray], velocity: &PropertyArray, ds: f64) -> GeoResult<Vec<f64>> {
        log::info!("Integrating travel times for {} rays", rays.len());

        #[cfg(feature = "parallel")]
        let times: Vec<f64> = {
            use rayon::prelude::*;
            rays.par_iter()
                .map(|ray| self.traveltime(ray, velocity, ds))
                .collect::<GeoResult<_>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let times: Vec<f64> = rays
            .iter()
            .map(|ray| self.traveltime(ray, velocity, ds))
            .collect::<GeoResult<_>>()?;

        log::info!("Travel-time table complete");
        Ok(times)
    }
}

/// Property values along the straight line from `(x0, z0)` towards `(x1, z1)`
pub fn find_points(
    x0: f64,
    z0: f64,
    x1: f64,
    z1: f64,
    nump: usize,
    model: &PropertyArray,
) -> GeoResult<Array1<GeoReal>> {
    let ray = Ray::new(x0, z0, x1, z1);
    log::info!("Sampling {} points along {:?}", nump, ray);
    let values = RaySampler::new(nump).find_points(&ray, model)?;
    log::info!("Sampled {} points", values.len());
    Ok(values)
}

/// Slowness integrated from `(x0, z0)` towards `(x1, z1)` with step `ds`
pub fn traveltime(
    x0: f64,
    z0: f64,
    x1: f64,
    z1: f64,
    model: &PropertyArray,
    nump: usize,
    ds: f64,
) -> GeoResult<f64> {
    let ray = Ray::new(x0, z0, x1, z1);
    log::info!("Integrating travel time along {:?} ({} points, ds {})", ray, nump, ds);
    let time = RaySampler::new(nump).traveltime(&ray, model, ds)?;
    log::info!("Travel time {:.6} s", time);
    Ok(time)
}

/// Round a coordinate up to a grid index, rejecting anything outside `0..len`
fn grid_index(coord: f64, len: usize, axis: &'static str) -> GeoResult<usize> {
    let index = coord.ceil();
    if index < 0.0 || index >= len as f64 {
        return Err(GeoError::OutOfBounds {
            axis,
            index: index as i64,
            len,
        });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModelBuilder;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn test_indices_round_up() {
        let property = Array2::from_shape_fn((4, 4), |(i, j)| (10 * i + j) as f32);
        let values = find_points(0.2, 0.2, 2.2, 2.2, 2, &property).unwrap();
        assert_eq!(values.to_vec(), vec![11.0, 22.0]);
    }

    #[test]
    fn test_end_point_is_excluded() {
        let property = Array2::from_shape_fn((5, 1), |(i, _)| i as f32);
        let values = find_points(0.0, 0.0, 4.0, 0.0, 4, &property).unwrap();
        assert_eq!(values.to_vec(), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_horizontal_ray_crosses_fault() {
        let grid = ModelBuilder::standard().build().unwrap();
        let values = find_points(0.0, 130.0, 500.0, 130.0, 10, grid.vp()).unwrap();

        assert_eq!(values.len(), 10);
        for (i, v) in values.iter().enumerate() {
            let expected = if i * 50 >= 250 { 2200.0 } else { 1800.0 };
            assert_eq!(*v, expected);
        }
    }

    #[test]
    fn test_out_of_bounds_rays() {
        let grid = ModelBuilder::standard().build().unwrap();

        let err = find_points(0.0, 10.0, 600.0, 10.0, 10, grid.vp()).unwrap_err();
        assert!(matches!(err, GeoError::OutOfBounds { axis: "x", .. }));

        let err = find_points(10.0, -5.0, 10.0, 100.0, 10, grid.vp()).unwrap_err();
        assert!(matches!(err, GeoError::OutOfBounds { axis: "z", .. }));

        assert!(traveltime(0.0, 0.0, 0.0, 900.0, grid.vp(), 100, 1.0).is_err());
    }

    #[test]
    fn test_constant_velocity_traveltime() {
        let velocity = Array2::from_elem((10, 200), 2000.0f32);
        let ray = Ray::new(0.0, 0.0, 0.0, 100.0);
        let sampler = RaySampler::new(100);

        let ds = sampler.uniform_step(&ray);
        assert_relative_eq!(ds, 1.0);
        assert_relative_eq!(sampler.traveltime(&ray, &velocity, ds).unwrap(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_traveltime_through_layers() {
        let grid = ModelBuilder::standard().build().unwrap();
        let t = traveltime(100.0, 0.0, 100.0, 760.0, grid.vp(), 760, 1.0).unwrap();
        let expected = 40.0 / 800.0 + 80.0 / 2200.0 + 40.0 / 1800.0 + 200.0 / 2400.0 + 400.0 / 4500.0;
        assert_relative_eq!(t, expected, max_relative = 1e-9);
    }

    #[test]
    fn test_batch_matches_single_rays() {
        let grid = ModelBuilder::standard().build().unwrap();
        let sampler = RaySampler::new(200);
        let rays: Vec<Ray> = (0..8)
            .map(|k| Ray::new(0.0, 0.0, 60.0 * k as f64, 700.0))
            .collect();

        let batch = sampler.traveltimes(&rays, grid.vp(), 1.0).unwrap();
        for (ray, t) in rays.iter().zip(batch) {
            assert_eq!(t, sampler.traveltime(ray, grid.vp(), 1.0).unwrap());
        }
    }

    #[test]
    fn test_invalid_sampling_parameters() {
        let velocity = Array2::from_elem((4, 4), 1000.0f32);
        let ray = Ray::new(0.0, 0.0, 3.0, 3.0);
        assert!(matches!(
            RaySampler::new(0).find_points(&ray, &velocity),
            Err(GeoError::Configuration(_))
        ));
        assert!(RaySampler::new(3).traveltime(&ray, &velocity, 0.0).is_err());
        assert!(RaySampler::new(3)
            .find_points(&Ray::new(f64::NAN, 0.0, 1.0, 1.0), &velocity)
            .is_err());

        let mut holes = velocity.clone();
        holes[[1, 1]] = 0.0;
        assert!(matches!(
            RaySampler::new(3).traveltime(&ray, &holes, 1.0),
            Err(GeoError::InvalidData(_))
        ));
    }
}
