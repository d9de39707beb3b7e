//! The overworld router.
//!
//! The shape is the classic one: a vertical gradient offset by a
//! continentalness/erosion/ridge spline gives the base "depth", scaled by a
//! second spline that controls steepness, roughened by 3D noise and cut by
//! cheese, spaghetti and entrance caves. The whole terrain term is marked for
//! cell interpolation and squeezed at the end.

use std::sync::Arc;

use crate::density::{CubicSpline, DensityFunction, Mapper, Marker};
use crate::noise::{NoiseParameters, NormalNoise};
use crate::random::{Random, RandomSplitter, Xoroshiro};

use super::{NoiseRouter, NoiseShape};

pub const TEMPERATURE: &str = "stratum:temperature";
pub const VEGETATION: &str = "stratum:vegetation";
pub const CONTINENTALNESS: &str = "stratum:continentalness";
pub const EROSION: &str = "stratum:erosion";
pub const RIDGE: &str = "stratum:ridge";
pub const OFFSET: &str = "stratum:offset";
pub const BASE_3D: &str = "stratum:base_3d";
pub const CAVE_CHEESE: &str = "stratum:cave_cheese";
pub const CAVE_ENTRANCE: &str = "stratum:cave_entrance";
pub const SPAGHETTI: &str = "stratum:spaghetti";
pub const AQUIFER_BARRIER: &str = "stratum:aquifer_barrier";
pub const AQUIFER_FLOODEDNESS: &str = "stratum:aquifer_fluid_level_floodedness";
pub const AQUIFER_SPREAD: &str = "stratum:aquifer_fluid_level_spread";
pub const AQUIFER_LAVA: &str = "stratum:aquifer_lava";
pub const SURFACE: &str = "stratum:surface";

/// Depth gradient spans this fixed range regardless of build height, so
/// sea level terrain stays put when the world is made taller.
const GRADIENT_BOTTOM: i32 = -64;
const GRADIENT_TOP: i32 = 320;

/// Octave layout of every named noise.
#[must_use]
pub fn parameters(id: &str) -> NoiseParameters {
    match id {
        TEMPERATURE => NoiseParameters::new(-10, &[1.5, 0.0, 1.0, 0.0, 0.0, 0.0]),
        VEGETATION => NoiseParameters::new(-8, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
        CONTINENTALNESS => NoiseParameters::new(-9, &[1.0, 1.0, 2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 1.0]),
        EROSION => NoiseParameters::new(-9, &[1.0, 1.0, 0.0, 1.0, 1.0]),
        RIDGE => NoiseParameters::new(-7, &[1.0, 2.0, 1.0, 0.0, 0.0, 0.0]),
        OFFSET => NoiseParameters::new(-3, &[1.0, 1.0, 1.0, 0.0]),
        BASE_3D => NoiseParameters::new(-6, &[1.0, 1.0, 1.0, 1.0]),
        CAVE_CHEESE => NoiseParameters::new(-8, &[0.5, 1.0, 2.0, 1.0, 2.0, 1.0, 0.0, 2.0, 0.0]),
        CAVE_ENTRANCE => NoiseParameters::new(-7, &[0.4, 0.5, 1.0]),
        SPAGHETTI => NoiseParameters::new(-7, &[1.0]),
        AQUIFER_BARRIER => NoiseParameters::new(-3, &[1.0]),
        AQUIFER_FLOODEDNESS => NoiseParameters::new(-7, &[1.0]),
        AQUIFER_SPREAD => NoiseParameters::new(-5, &[1.0]),
        AQUIFER_LAVA => NoiseParameters::new(-1, &[1.0]),
        SURFACE => NoiseParameters::new(-6, &[1.0, 1.0, 1.0]),
        _ => NoiseParameters::new(-4, &[1.0]),
    }
}

/// Root positional factory for a world seed.
#[must_use]
pub fn world_random(seed: u64) -> RandomSplitter {
    Xoroshiro::from_seed(seed).next_positional()
}

/// Creates the named noise from the world factory.
#[must_use]
pub fn create_noise(random: &RandomSplitter, id: &str) -> Arc<NormalNoise> {
    Arc::new(NormalNoise::named(random, id, &parameters(id)))
}

type Df = Arc<DensityFunction>;

fn c(value: f64) -> Df {
    DensityFunction::constant(value)
}

fn flat(input: Df) -> Df {
    DensityFunction::marked(Marker::FlatCache, input)
}

/// Terrain height offset from continentalness, erosion and folded ridges.
fn offset_spline(continents: &Df, erosion: &Df, ridges_folded: &Df) -> CubicSpline {
    let peaks = |low: f32, mid: f32, high: f32| {
        CubicSpline::new(ridges_folded.clone())
            .point(-1.0, low, 0.0)
            .point(0.0, mid, 0.0)
            .point(1.0, high, 0.0)
    };
    let near_inland = CubicSpline::new(erosion.clone())
        .point(-0.8, peaks(0.0, 0.12, 0.3), 0.0)
        .point(-0.38, -0.15, 0.0)
        .point(0.05, -0.3, 0.0)
        .point(0.45, -0.44, 0.0)
        .point(0.7, -0.47, 0.0);
    let far_inland = CubicSpline::new(erosion.clone())
        .point(-0.8, peaks(0.2, 0.35, 0.6), 0.0)
        .point(-0.38, 0.0, 0.0)
        .point(0.05, -0.2, 0.0)
        .point(0.45, -0.4, 0.0)
        .point(0.7, -0.46, 0.0);

    CubicSpline::new(continents.clone())
        .point(-1.05, -0.84, 0.0)
        .point(-0.455, -0.69, 0.0)
        .point(-0.19, -0.53, 0.0)
        .point(-0.11, -0.5, 0.0)
        .point(0.03, -0.45, 0.0)
        .point(0.3, near_inland, 0.0)
        .point(1.0, far_inland, 0.0)
}

/// Steepness of the density falloff around the surface. Low factors let 3D
/// noise dominate, which is what makes mountains rugged.
fn factor_spline(continents: &Df, erosion: &Df) -> CubicSpline {
    let inland = |rugged: f32| {
        CubicSpline::new(erosion.clone())
            .point(-0.8, rugged, 0.0)
            .point(0.0, 4.5, 0.0)
            .point(0.5, 6.0, 0.0)
    };
    CubicSpline::new(continents.clone())
        .point(-0.19, 3.95, 0.0)
        .point(0.3, inland(2.5), 0.0)
        .point(1.0, inland(2.0), 0.0)
}

/// Fades density to fixed values near the build limits.
fn slide(shape: &NoiseShape, input: Df) -> Df {
    let top = DensityFunction::y_clamped_gradient(shape.max_y() - 80, shape.max_y() - 16, 1.0, 0.0);
    let top_slid = DensityFunction::add(
        c(-0.078_125),
        DensityFunction::mul(top, DensityFunction::add(input, c(0.078_125))),
    );
    let bottom = DensityFunction::y_clamped_gradient(shape.min_y + 8, shape.min_y + 24, 0.0, 1.0);
    DensityFunction::add(
        c(0.117_187_5),
        DensityFunction::mul(bottom, DensityFunction::add(top_slid, c(-0.117_187_5))),
    )
}

/// Builds the overworld router for `seed`.
#[must_use]
pub fn overworld(seed: u64, shape: &NoiseShape) -> NoiseRouter {
    log::debug!("Building overworld noise router for seed {seed}");
    let random = world_random(seed);
    let noise = |id: &str| create_noise(&random, id);

    let offset_noise = noise(OFFSET);
    let shift_x = flat(DensityFunction::marked(
        Marker::Cache2d,
        Arc::new(DensityFunction::ShiftA(offset_noise.clone())),
    ));
    let shift_z = flat(DensityFunction::marked(
        Marker::Cache2d,
        Arc::new(DensityFunction::ShiftB(offset_noise)),
    ));
    let shifted = |id: &str| {
        flat(Arc::new(DensityFunction::ShiftedNoise {
            shift_x: shift_x.clone(),
            shift_y: c(0.0),
            shift_z: shift_z.clone(),
            xz_scale: 0.25,
            y_scale: 0.0,
            noise: noise(id),
        }))
    };

    let temperature = shifted(TEMPERATURE);
    let vegetation = shifted(VEGETATION);
    let continents = shifted(CONTINENTALNESS);
    let erosion = shifted(EROSION);
    let ridges = shifted(RIDGE);

    let ridges_folded = DensityFunction::affine(
        DensityFunction::map(
            Mapper::Abs,
            DensityFunction::affine(DensityFunction::map(Mapper::Abs, ridges.clone()), 1.0, -2.0 / 3.0),
        ),
        -3.0,
        1.0,
    );

    let offset = flat(DensityFunction::spline(offset_spline(&continents, &erosion, &ridges_folded)));
    let factor = flat(DensityFunction::spline(factor_spline(&continents, &erosion)));

    let depth = DensityFunction::add(
        DensityFunction::y_clamped_gradient(GRADIENT_BOTTOM, GRADIENT_TOP, 1.5, -1.5),
        offset,
    );

    let gradient_density = DensityFunction::mul(
        c(4.0),
        DensityFunction::map(Mapper::QuarterNegative, DensityFunction::mul(depth.clone(), factor)),
    );
    let sloped_cheese = DensityFunction::add(
        gradient_density.clone(),
        DensityFunction::noise(noise(BASE_3D), 1.0, 1.5),
    );

    // Suppresses caves close to the surface, fading in with depth.
    let surface_guard = DensityFunction::clamp(DensityFunction::affine(sloped_cheese.clone(), -0.64, 1.5), 0.0, 0.5);
    let cheese = DensityFunction::add(
        DensityFunction::clamp(
            DensityFunction::add(c(0.27), DensityFunction::noise(noise(CAVE_CHEESE), 1.0, 0.666_666_666_666_666_6)),
            -1.0,
            1.0,
        ),
        surface_guard.clone(),
    );
    let spaghetti = DensityFunction::add(
        DensityFunction::add(
            DensityFunction::map(Mapper::Abs, DensityFunction::noise(noise(SPAGHETTI), 1.0, 1.0)),
            c(-0.05),
        ),
        surface_guard,
    );
    let entrances = DensityFunction::add(
        DensityFunction::add(c(0.37), DensityFunction::noise(noise(CAVE_ENTRANCE), 0.75, 0.5)),
        DensityFunction::y_clamped_gradient(-10, 30, 0.3, 0.0),
    );

    let near_surface = DensityFunction::min(sloped_cheese.clone(), DensityFunction::mul(c(5.0), entrances));
    let underground = DensityFunction::min(sloped_cheese.clone(), DensityFunction::min(cheese, spaghetti));
    let terrain = Arc::new(DensityFunction::RangeChoice {
        input: sloped_cheese,
        min_inclusive: -1_000_000.0,
        max_exclusive: 1.5625,
        when_in_range: near_surface,
        when_out_of_range: underground,
    });

    let final_density = DensityFunction::map(
        Mapper::Squeeze,
        DensityFunction::mul(
            c(0.64),
            DensityFunction::marked(Marker::Interpolated, slide(shape, terrain)),
        ),
    );

    let initial_density_without_jaggedness = DensityFunction::clamp(
        slide(shape, DensityFunction::add(c(-0.703_125), gradient_density)),
        -64.0,
        64.0,
    );

    let barrier = DensityFunction::noise(noise(AQUIFER_BARRIER), 1.0, 0.5);
    let fluid_level_floodedness = DensityFunction::noise(noise(AQUIFER_FLOODEDNESS), 1.0, 0.67);
    let fluid_level_spread = DensityFunction::noise(noise(AQUIFER_SPREAD), 1.0, 0.714_285_714_285_714_3);
    let lava = DensityFunction::noise(noise(AQUIFER_LAVA), 1.0, 1.0);

    NoiseRouter {
        barrier,
        fluid_level_floodedness,
        fluid_level_spread,
        lava,
        temperature,
        vegetation,
        continents,
        erosion,
        depth,
        ridges,
        initial_density_without_jaggedness,
        final_density,
        random,
    }
}
