use super::quantize_coord;

/// A sampled, quantised climate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TargetPoint {
    pub temperature: i64,
    pub humidity: i64,
    pub continentalness: i64,
    pub erosion: i64,
    pub depth: i64,
    pub weirdness: i64,
}

impl TargetPoint {
    #[must_use]
    pub fn from_values(
        temperature: f64,
        humidity: f64,
        continentalness: f64,
        erosion: f64,
        depth: f64,
        weirdness: f64,
    ) -> Self {
        Self {
            temperature: quantize_coord(temperature),
            humidity: quantize_coord(humidity),
            continentalness: quantize_coord(continentalness),
            erosion: quantize_coord(erosion),
            depth: quantize_coord(depth),
            weirdness: quantize_coord(weirdness),
        }
    }
}

/// Inclusive quantised interval along one climate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub min: i64,
    pub max: i64,
}

impl Parameter {
    #[must_use]
    pub fn point(value: f32) -> Self {
        Self::span(value, value)
    }

    #[must_use]
    pub fn span(min: f32, max: f32) -> Self {
        debug_assert!(min <= max, "parameter span {min}..{max} is inverted");
        Self {
            min: quantize_coord(f64::from(min)),
            max: quantize_coord(f64::from(max)),
        }
    }

    /// Distance from `value` to the interval, zero inside it.
    #[inline]
    #[must_use]
    pub const fn distance(&self, value: i64) -> i64 {
        if value > self.max {
            value - self.max
        } else if value < self.min {
            self.min - value
        } else {
            0
        }
    }
}

/// Region of climate space a biome occupies, plus a fixed penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterPoint {
    pub temperature: Parameter,
    pub humidity: Parameter,
    pub continentalness: Parameter,
    pub erosion: Parameter,
    pub depth: Parameter,
    pub weirdness: Parameter,
    pub offset: i64,
}

impl ParameterPoint {
    /// Squared distance to `target`; lower is a better fit.
    #[inline]
    #[must_use]
    pub const fn fitness(&self, target: &TargetPoint) -> i64 {
        let t = self.temperature.distance(target.temperature);
        let h = self.humidity.distance(target.humidity);
        let c = self.continentalness.distance(target.continentalness);
        let e = self.erosion.distance(target.erosion);
        let d = self.depth.distance(target.depth);
        let w = self.weirdness.distance(target.weirdness);
        t * t + h * h + c * c + e * e + d * d + w * w + self.offset * self.offset
    }
}

/// Nearest-region lookup table.
///
/// Tables are small (tens of entries), so lookup is a linear scan. Ties go to
/// the earlier entry, which makes results independent of any cache state.
#[derive(Debug, Clone)]
pub struct ParameterList<T> {
    entries: Vec<(ParameterPoint, T)>,
}

impl<T> ParameterList<T> {
    /// Panics on an empty table.
    #[must_use]
    pub fn new(entries: Vec<(ParameterPoint, T)>) -> Self {
        assert!(!entries.is_empty(), "parameter list needs at least one entry");
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[(ParameterPoint, T)] {
        &self.entries
    }

    /// Index of the best entry for `target`.
    #[must_use]
    pub fn find_index(&self, target: &TargetPoint) -> usize {
        let mut best = 0;
        let mut best_fitness = i64::MAX;
        for (i, (point, _)) in self.entries.iter().enumerate() {
            let fitness = point.fitness(target);
            if fitness < best_fitness {
                best = i;
                best_fitness = fitness;
                if fitness == 0 {
                    break;
                }
            }
        }
        best
    }

    #[must_use]
    pub fn find_value(&self, target: &TargetPoint) -> &T {
        &self.entries[self.find_index(target)].1
    }
}
