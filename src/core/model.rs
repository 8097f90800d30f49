use crate::types::{GeoError, GeoReal, GeoResult, PropertyArray};
use ndarray::{s, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

/// Elastic and derived properties stored on a model grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Property {
    Vp,
    Vs,
    Rho,
    Impedance,
    Reflectivity,
}

impl Property {
    pub const ALL: [Property; 5] = [
        Property::Vp,
        Property::Vs,
        Property::Rho,
        Property::Impedance,
        Property::Reflectivity,
    ];
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Vp => write!(f, "vp"),
            Property::Vs => write!(f, "vs"),
            Property::Rho => write!(f, "rho"),
            Property::Impedance => write!(f, "impedance"),
            Property::Reflectivity => write!(f, "reflectivity"),
        }
    }
}

impl FromStr for Property {
    type Err = GeoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vp" => Ok(Property::Vp),
            "vs" => Ok(Property::Vs),
            "rho" => Ok(Property::Rho),
            "impedance" | "z" => Ok(Property::Impedance),
            "reflectivity" | "R" => Ok(Property::Reflectivity),
            _ => Err(GeoError::Configuration(format!(
                "Unknown model property: {}",
                s
            ))),
        }
    }
}

/// Layered model parameters with a single fault block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    /// Layer thicknesses in depth samples, top to bottom
    pub dz: Vec<usize>,
    /// P-wave velocity per layer (m/s)
    pub vp: Vec<GeoReal>,
    /// Density per layer (kg/m^3)
    pub rho: Vec<GeoReal>,
    /// Horizontal extent in samples
    pub nx: usize,
    /// vs = vp / vp_vs_ratio
    pub vp_vs_ratio: GeoReal,
    /// Horizontal range of the fault block
    pub fault_x: Range<usize>,
    /// Depth range of the upthrown fault marker
    pub fault_z: Range<usize>,
    /// Vertical offset of the downthrown marker (samples)
    pub fault_throw: usize,
    /// Layer whose properties fill the upthrown marker
    pub fault_upper_layer: usize,
    /// Layer whose properties fill the downthrown marker
    pub fault_lower_layer: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            dz: vec![40, 80, 40, 200, 400],
            vp: vec![800.0, 2200.0, 1800.0, 2400.0, 4500.0],
            rho: vec![1500.0, 2500.0, 1400.0, 2700.0, 4500.0],
            nx: 500,
            vp_vs_ratio: 2.0,
            fault_x: 250..500,
            fault_z: 120..160,
            fault_throw: 20,
            fault_upper_layer: 1,
            fault_lower_layer: 2,
        }
    }
}

impl ModelParams {
    pub fn nlayers(&self) -> usize {
        self.dz.len()
    }

    /// Total depth samples
    pub fn nz(&self) -> usize {
        self.dz.iter().sum()
    }

    fn validate(&self) -> GeoResult<()> {
        let nlayers = self.nlayers();
        if nlayers == 0 {
            return Err(GeoError::Configuration("Model has no layers".to_string()));
        }
        if self.vp.len() != nlayers || self.rho.len() != nlayers {
            return Err(GeoError::Configuration(format!(
                "Layer arrays disagree: {} thicknesses, {} velocities, {} densities",
                nlayers,
                self.vp.len(),
                self.rho.len()
            )));
        }
        if let Some(layer) = self.dz.iter().position(|&t| t == 0) {
            return Err(GeoError::Configuration(format!(
                "Layer {} has zero thickness",
                layer
            )));
        }
        let positive = |v: &GeoReal| v.is_finite() && *v > 0.0;
        if !self.vp.iter().all(positive) || !self.rho.iter().all(positive) {
            return Err(GeoError::Configuration(
                "Layer velocities and densities must be positive".to_string(),
            ));
        }
        if !positive(&self.vp_vs_ratio) {
            return Err(GeoError::Configuration(format!(
                "Vp/Vs ratio must be positive, got {}",
                self.vp_vs_ratio
            )));
        }
        if self.nx == 0 {
            return Err(GeoError::Configuration("Model has zero width".to_string()));
        }

        if self.fault_x.is_empty() || self.fault_z.is_empty() {
            return Err(GeoError::Configuration(format!(
                "Empty fault window x={:?} z={:?}",
                self.fault_x, self.fault_z
            )));
        }
        if self.fault_x.end > self.nx {
            return Err(GeoError::Configuration(format!(
                "Fault x-range {:?} exceeds model width {}",
                self.fault_x, self.nx
            )));
        }
        let nz = self.nz();
        if self.fault_z.end + self.fault_throw > nz {
            return Err(GeoError::Configuration(format!(
                "Fault depth range {:?} with throw {} exceeds model depth {}",
                self.fault_z, self.fault_throw, nz
            )));
        }
        if self.fault_upper_layer >= nlayers || self.fault_lower_layer >= nlayers {
            return Err(GeoError::Configuration(format!(
                "Fault layers {} and {} must be below {}",
                self.fault_upper_layer, self.fault_lower_layer, nlayers
            )));
        }
        Ok(())
    }
}

/// 2D subsurface model, every property indexed `[x, z]`
#[derive(Debug, Clone)]
pub struct Grid {
    dz: Vec<usize>,
    vp: PropertyArray,
    vs: PropertyArray,
    rho: PropertyArray,
    impedance: PropertyArray,
    reflectivity: PropertyArray,
}

impl Grid {
    /// Assemble a grid from elastic properties, deriving impedance and
    /// reflectivity. All arrays must be `(nx, sum(dz))`.
    pub fn from_parts(
        dz: Vec<usize>,
        vp: PropertyArray,
        vs: PropertyArray,
        rho: PropertyArray,
    ) -> GeoResult<Self> {
        let nz: usize = dz.iter().sum();
        let nx = vp.nrows();
        for (name, array) in [("vp", &vp), ("vs", &vs), ("rho", &rho)] {
            if array.dim() != (nx, nz) {
                return Err(GeoError::InvalidData(format!(
                    "{} is {:?}, expected ({}, {})",
                    name,
                    array.dim(),
                    nx,
                    nz
                )));
            }
        }
        if nx == 0 || nz == 0 {
            return Err(GeoError::InvalidData("Grid is empty".to_string()));
        }
        for (name, array) in [("vp", &vp), ("vs", &vs), ("rho", &rho)] {
            let bad = array
                .indexed_iter()
                .find(|(_, v)| !(v.is_finite() && **v > 0.0));
            if let Some(((ix, iz), v)) = bad {
                return Err(GeoError::InvalidData(format!(
                    "{} must be positive everywhere, got {} at ({}, {})",
                    name, v, ix, iz
                )));
            }
        }

        let impedance = &vp * &rho;
        let reflectivity = reflectivity(&impedance, dz[0] + 2);

        Ok(Self {
            dz,
            vp,
            vs,
            rho,
            impedance,
            reflectivity,
        })
    }

    pub fn nx(&self) -> usize {
        self.vp.nrows()
    }

    pub fn nz(&self) -> usize {
        self.vp.ncols()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.vp.dim()
    }

    pub fn dz(&self) -> &[usize] {
        &self.dz
    }

    /// Depth sample at the base of each layer
    pub fn depths(&self) -> Vec<usize> {
        self.dz
            .iter()
            .scan(0, |depth, t| {
                *depth += t;
                Some(*depth)
            })
            .collect()
    }

    pub fn vp(&self) -> &PropertyArray {
        &self.vp
    }

    pub fn vs(&self) -> &PropertyArray {
        &self.vs
    }

    pub fn rho(&self) -> &PropertyArray {
        &self.rho
    }

    pub fn impedance(&self) -> &PropertyArray {
        &self.impedance
    }

    pub fn reflectivity(&self) -> &PropertyArray {
        &self.reflectivity
    }

    pub fn property(&self, property: Property) -> &PropertyArray {
        match property {
            Property::Vp => &self.vp,
            Property::Vs => &self.vs,
            Property::Rho => &self.rho,
            Property::Impedance => &self.impedance,
            Property::Reflectivity => &self.reflectivity,
        }
    }
}

/// Normal-incidence reflection coefficient between each depth sample and the
/// one below it. The last sample and the first `mute` samples are zeroed.
fn reflectivity(impedance: &PropertyArray, mute: usize) -> PropertyArray {
    let (nx, nz) = impedance.dim();
    let mut r = Array2::zeros((nx, nz));
    if nz < 2 {
        return r;
    }

    let upper = impedance.slice(s![.., ..nz - 1]);
    let lower = impedance.slice(s![.., 1..]);
    r.slice_mut(s![.., ..nz - 1])
        .assign(&((&lower - &upper) / (&lower + &upper)));

    r.index_axis_mut(Axis(1), nz - 1).fill(0.0);
    r.slice_mut(s![.., ..mute.min(nz)]).fill(0.0);
    r
}

/// Builder for the layered, faulted model
pub struct ModelBuilder {
    params: ModelParams,
}

impl ModelBuilder {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    /// Builder for the reference five-layer model
    pub fn standard() -> Self {
        Self::new(ModelParams::default())
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Build the model grid
    pub fn build(&self) -> GeoResult<Grid> {
        self.params.validate()?;
        let p = &self.params;

        log::info!(
            "Building {}-layer model, {} x {} samples",
            p.nlayers(),
            p.nx,
            p.nz()
        );
        log::debug!(
            "Fault block x={:?} z={:?} throw={}",
            p.fault_x,
            p.fault_z,
            p.fault_throw
        );

        let vs_layers: Vec<GeoReal> = p.vp.iter().map(|v| v / p.vp_vs_ratio).collect();
        let vp = self.faulted_layers(&p.vp);
        let vs = self.faulted_layers(&vs_layers);
        let rho = self.faulted_layers(&p.rho);

        let grid = Grid::from_parts(p.dz.clone(), vp, vs, rho)?;
        log::info!("Model built: interfaces at depths {:?}", grid.depths());
        Ok(grid)
    }

    /// Stack constant-valued layers and overwrite the two fault markers
    fn faulted_layers(&self, values: &[GeoReal]) -> PropertyArray {
        let p = &self.params;
        let mut array = Array2::zeros((p.nx, p.nz()));

        let mut top = 0;
        for (&thickness, &value) in p.dz.iter().zip(values.iter()) {
            array.slice_mut(s![.., top..top + thickness]).fill(value);
            top += thickness;
        }

        let throw = p.fault_throw;
        array
            .slice_mut(s![p.fault_x.clone(), p.fault_z.clone()])
            .fill(values[p.fault_upper_layer]);
        array
            .slice_mut(s![
                p.fault_x.clone(),
                p.fault_z.start + throw..p.fault_z.end + throw
            ])
            .fill(values[p.fault_lower_layer]);
        array
    }
}
