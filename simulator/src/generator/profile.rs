use compcore::context::SPEED_OF_LIGHT_KMS;
use compcore::interface::{Extension, Header, Observation, ObservationSource, ReduceRequest};
use compcore::{InstrumentContext, ReduceResult};
use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Parameters of the synthetic averaged observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Edge length of the square image.
    pub image_size: usize,
    /// Occulter ID written to the header; its radius comes from the context.
    pub occulter_id: String,
    pub field_radius: f64,
    /// Field-stop center offset from the occulter center, pixels.
    pub field_offset: [f64; 2],
    /// Post angle in the image, degrees.
    pub post_angle: f64,
    pub p_angle: f64,
    pub ntune: usize,
    /// Tune spacing, nm.
    pub tune_spacing: f64,
    /// Line intensity at the occulter edge.
    pub peak: f64,
    /// Gaussian 1/e half-width, nm.
    pub line_width: f64,
    /// Line-of-sight velocity common to every pixel, km/s.
    pub velocity: f64,
    /// Velocity gradient per occulter radius toward +x, km/s.
    pub east_west: f64,
    /// Linear polarization fraction.
    pub polarization: f64,
    /// Relative uniform noise on every plane.
    pub noise: f64,
    pub seed: u64,
    /// Dates for which no input exists.
    pub missing_dates: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            image_size: 620,
            occulter_id: "1".into(),
            field_radius: 290.0,
            field_offset: [2.0, -1.0],
            post_angle: 270.0,
            p_angle: 0.0,
            ntune: 3,
            tune_spacing: 0.12,
            peak: 30.0,
            line_width: 0.07,
            velocity: 1.5,
            east_west: 0.8,
            polarization: 0.1,
            noise: 0.01,
            seed: 7,
            missing_dates: Vec::new(),
        }
    }
}

/// [`ObservationSource`] that synthesizes a Gaussian emission line over an
/// occulted annulus.
pub struct SyntheticSource {
    ctx: InstrumentContext,
    config: GeneratorConfig,
}

impl SyntheticSource {
    pub fn new(ctx: InstrumentContext, config: GeneratorConfig) -> Self {
        Self { ctx, config }
    }

    fn seed_for(&self, request: &ReduceRequest) -> u64 {
        request
            .input_name()
            .bytes()
            .fold(self.config.seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
    }

    fn build(&self, request: &ReduceRequest) -> ReduceResult<Observation> {
        let cfg = &self.config;
        let constants = self.ctx.waves.lookup(request.wave_type)?;
        let occulter_radius = self.ctx.occulter_radius(&cfg.occulter_id)?;
        let size = cfg.image_size;
        let c = (size as f64 - 1.0) / 2.0;
        let ntune = cfg.ntune.max(3);
        let first = constants.rest_wavelength - cfg.tune_spacing * ((ntune - 1) / 2) as f64;
        let wavelengths: Vec<f64> = (0..ntune).map(|t| first + t as f64 * cfg.tune_spacing).collect();

        // Per-pixel (peak, line center) in the annulus; zero outside.
        let nm_per_kms = constants.nominal_wavelength / SPEED_OF_LIGHT_KMS;
        let scene = Array2::from_shape_fn((size, size), |(y, x)| {
            let dx = x as f64 - c;
            let dy = y as f64 - c;
            let r = dx.hypot(dy);
            let rf = (dx - cfg.field_offset[0]).hypot(dy - cfg.field_offset[1]);
            if r <= occulter_radius || rf >= cfg.field_radius {
                return (0.0, constants.rest_wavelength);
            }
            let peak = cfg.peak * (occulter_radius / r).powi(3);
            let velocity = cfg.velocity + cfg.east_west * dx / occulter_radius;
            (peak, constants.rest_wavelength + velocity * nm_per_kms)
        });

        let mut rng = StdRng::seed_from_u64(self.seed_for(request));
        let mut jitter = |value: f64| {
            if cfg.noise > 0.0 {
                value * (1.0 + rng.gen_range(-cfg.noise..cfg.noise))
            } else {
                value
            }
        };

        let (sin, cos) = (2.0 * 30f64.to_radians()).sin_cos();
        let mut extensions = Vec::with_capacity(5 * ntune);
        for block in 0..5 {
            for &wave in &wavelengths {
                let data = scene.mapv(|(peak, center)| {
                    let i = peak * (-((wave - center) / cfg.line_width).powi(2)).exp();
                    let value = match block {
                        0 => i,
                        1 => cfg.polarization * cos * i,
                        2 => cfg.polarization * sin * i,
                        _ => 0.0,
                    };
                    jitter(value) as f32
                });
                let mut header = Header::new();
                header.set_with_comment("WAVELENG", wave, Some("wavelength [nm]"));
                extensions.push(Extension { header, data });
            }
        }

        let mut primary = Header::new();
        primary.set("NTUNE", ntune);
        primary.set("OBS_PLAN", if request.synoptic { "synoptic" } else { "waves" });
        primary.set("OBS_ID", "synthetic");
        primary.set("OCC-ID", cfg.occulter_id.as_str());
        primary.set("CRPIX1", c + 1.0);
        primary.set("CRPIX2", c + 1.0);
        primary.set("FRPIX1", c + 1.0 + cfg.field_offset[0]);
        primary.set("FRPIX2", c + 1.0 + cfg.field_offset[1]);
        primary.set("ORADIUS", occulter_radius);
        primary.set("FRADIUS", cfg.field_radius);
        primary.set("POSTPANG", cfg.post_angle + cfg.p_angle);
        primary.set(
            "OVRLPANG",
            compcore::geometry::overlap_angle(cfg.field_offset[0], cfg.field_offset[1]) + cfg.p_angle,
        );
        primary.set("SOLAR_P0", cfg.p_angle);

        Ok(Observation {
            name: request.input_name(),
            primary,
            extensions,
        })
    }
}

impl ObservationSource for SyntheticSource {
    fn load(&self, request: &ReduceRequest) -> ReduceResult<Option<Observation>> {
        if self.config.missing_dates.contains(&request.date) {
            return Ok(None);
        }
        self.build(request).map(Some)
    }
}
