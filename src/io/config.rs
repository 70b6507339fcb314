//! Configuration file loading and validation
//!
//! The configuration is a TOML document with the sections `paths`, `navigation`,
//! `simParams`, `facetParams`, `outputs` and an optional `scatterParams`:
//!
//! ```toml
//! [paths]
//! navpath = "/data/nav/track01.csv"
//! dempath = "/data/dem/greenland.tif"
//! outpath = "/data/out"
//! sigpath = ""
//!
//! [navigation]
//! navsys = "EPSG:4326"
//!
//! [simParams]
//! speedlight = 299792458.0
//! dt = 1.0e-8
//! tracesamples = 3200
//!
//! [facetParams]
//! atdist = 3000.0
//! ctdist = 3000.0
//! atstep = 30.0
//! ctstep = 30.0
//!
//! [outputs]
//! combined = "True"
//! fret = "t"
//! ```

use crate::core::binning::TraceParams;
use crate::core::facet_grid::FacetParams;
use crate::core::frames::{LLE_SYSTEM, XYZ_SYSTEM};
use crate::core::scatter::{ScatteringLaw, SimulationParams};
use crate::types::{ClutterError, ClutterResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Raw configuration document as written on disk
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub navigation: NavigationSection,
    #[serde(rename = "simParams")]
    pub sim_params: SimParamsSection,
    #[serde(rename = "facetParams")]
    pub facet_params: FacetParams,
    #[serde(rename = "scatterParams", default)]
    pub scatter_params: ScatteringLaw,
    #[serde(default)]
    pub outputs: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    pub navpath: PathBuf,
    pub dempath: PathBuf,
    pub outpath: PathBuf,
    #[serde(default)]
    pub sigpath: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NavigationSection {
    pub navsys: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimParamsSection {
    pub speedlight: f64,
    pub dt: f64,
    pub tracesamples: i64,
}

/// Command line overrides for configured paths
#[derive(Debug, Clone, Default)]
pub struct PathOverrides {
    pub navpath: Option<PathBuf>,
    pub dempath: Option<PathBuf>,
    pub outpath: Option<PathBuf>,
}

/// Resolved input and output locations
#[derive(Debug, Clone, PartialEq)]
pub struct PathConfig {
    pub navpath: PathBuf,
    pub dempath: PathBuf,
    pub outdir: PathBuf,
    pub sigpath: Option<PathBuf>,
}

impl PathConfig {
    /// Output file path `<outdir>/<navname>_<product>`
    pub fn product_path(&self, product: &str) -> PathBuf {
        let navname = self
            .navpath
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .unwrap_or("");
        self.outdir.join(format!("{}_{}", navname, product))
    }
}

/// Coordinate systems used by the run
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationConfig {
    /// CRS of the trajectory file, axes in authority order (lat, lon for EPSG:4326)
    pub navsys: String,
    /// Cartesian working frame
    pub xyzsys: String,
    /// Geographic output frame
    pub llesys: String,
}

/// Output product switches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputFlags {
    flags: BTreeMap<String, bool>,
}

impl OutputFlags {
    /// Flag value, products default to enabled
    pub fn enabled(&self, product: &str) -> bool {
        self.flags.get(product).copied().unwrap_or(true)
    }

    pub fn combined(&self) -> bool {
        self.enabled("combined")
    }

    pub fn first_return(&self) -> bool {
        self.enabled("fret")
    }
}

/// Validated configuration consumed by the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct ClutterConfig {
    pub paths: PathConfig,
    pub navigation: NavigationConfig,
    pub simulation: SimulationParams,
    pub trace: TraceParams,
    pub outputs: OutputFlags,
    /// Set when a signal path is configured
    pub coherent: bool,
}

impl ClutterConfig {
    /// Read, override, validate and resolve a configuration file
    pub fn load<P: AsRef<Path>>(path: P, overrides: &PathOverrides) -> ClutterResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ClutterError::Config(format!(
                "Invalid path to config file - {} does not exist",
                path.display()
            )));
        }

        log::info!("Reading configuration: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text, overrides)?;
        config.check_paths()?;
        Ok(config)
    }

    /// Parse and validate a configuration document without touching the filesystem
    pub fn from_toml_str(text: &str, overrides: &PathOverrides) -> ClutterResult<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Self::from_file(file, overrides)
    }

    pub fn from_file(file: ConfigFile, overrides: &PathOverrides) -> ClutterResult<Self> {
        let sigpath = file
            .paths
            .sigpath
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let coherent = sigpath.is_some();

        let paths = PathConfig {
            navpath: overrides.navpath.clone().unwrap_or(file.paths.navpath),
            dempath: overrides.dempath.clone().unwrap_or(file.paths.dempath),
            outdir: overrides.outpath.clone().unwrap_or(file.paths.outpath),
            sigpath,
        };

        if file.sim_params.tracesamples <= 0 {
            return Err(ClutterError::Config(format!(
                "tracesamples must be a positive integer, got {}",
                file.sim_params.tracesamples
            )));
        }

        let config = Self {
            paths,
            navigation: NavigationConfig {
                navsys: file.navigation.navsys,
                xyzsys: XYZ_SYSTEM.to_string(),
                llesys: LLE_SYSTEM.to_string(),
            },
            simulation: SimulationParams {
                facet: file.facet_params,
                scattering: file.scatter_params,
                speed_light: file.sim_params.speedlight,
            },
            trace: TraceParams {
                dt: file.sim_params.dt,
                trace_samples: file.sim_params.tracesamples as usize,
            },
            outputs: parse_output_flags(&file.outputs)?,
            coherent,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check numeric parameter legality
    pub fn validate(&self) -> ClutterResult<()> {
        let sim = &self.simulation;
        positive("speedlight", sim.speed_light)?;
        positive("dt", self.trace.dt)?;

        let facet = &sim.facet;
        positive("atstep", facet.at_step)?;
        positive("ctstep", facet.ct_step)?;
        check_extent("atdist", facet.at_dist, "atstep", facet.at_step)?;
        check_extent("ctdist", facet.ct_dist, "ctstep", facet.ct_step)?;

        let law = &sim.scattering;
        if !(law.gain >= 0.0 && law.gain.is_finite()) {
            return Err(ClutterError::Config(format!("gain must be non-negative, got {}", law.gain)));
        }
        positive("cosexponent", law.cos_exponent)?;
        if !(law.range_exponent >= 0.0 && law.range_exponent.is_finite()) {
            return Err(ClutterError::Config(format!(
                "rangeexponent must be non-negative, got {}",
                law.range_exponent
            )));
        }
        Ok(())
    }

    /// Check that input files and the output directory exist
    pub fn check_paths(&self) -> ClutterResult<()> {
        if !self.paths.navpath.is_file() {
            return Err(ClutterError::Config(format!(
                "Invalid path to navigation file - {} does not exist",
                self.paths.navpath.display()
            )));
        }
        if !self.paths.dempath.is_file() {
            return Err(ClutterError::Config(format!(
                "Invalid path to DEM file - {} does not exist",
                self.paths.dempath.display()
            )));
        }
        if !self.paths.outdir.is_dir() {
            return Err(ClutterError::Config(format!(
                "Invalid path to output files - folder {} does not exist",
                self.paths.outdir.display()
            )));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> ClutterResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ClutterError::Config(format!("{} must be positive, got {}", name, value)))
    }
}

fn check_extent(dist_name: &str, dist: f64, step_name: &str, step: f64) -> ClutterResult<()> {
    if !(dist >= step) || !dist.is_finite() {
        return Err(ClutterError::Config(format!(
            "{} must be greater than {} ({} < {})",
            dist_name, step_name, dist, step
        )));
    }

    let ratio = dist / step;
    if (ratio - ratio.round()).abs() > 1e-9 * ratio.max(1.0) {
        return Err(ClutterError::Config(format!(
            "{} must be integer multiple of {} ({} / {} = {})",
            dist_name, step_name, dist, step, ratio
        )));
    }
    Ok(())
}

/// Accepts booleans or the case-insensitive strings true/t/false/f
fn parse_output_flags(raw: &BTreeMap<String, toml::Value>) -> ClutterResult<OutputFlags> {
    let mut flags = BTreeMap::new();
    for (key, value) in raw {
        let flag = match value {
            toml::Value::Boolean(b) => Some(*b),
            toml::Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "t" => Some(true),
                "false" | "f" => Some(false),
                _ => None,
            },
            _ => None,
        };

        let Some(flag) = flag else {
            return Err(ClutterError::Config(format!(
                "Invalid value for outputs:{} - must be \"True\" or \"False\"",
                key
            )));
        };
        if key != "combined" && key != "fret" {
            log::debug!("Output flag '{}' is not used by this simulator", key);
        }
        flags.insert(key.clone(), flag);
    }
    Ok(OutputFlags { flags })
}
