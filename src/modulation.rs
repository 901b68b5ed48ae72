//! Mapping of bits to constellation points and soft demapping back to bit LLR values
//!
//! Each point of a constellation is labeled by its index: bit `j` of a word of
//! [`Modulation::word_width`] bits is bit `j` of the index of the point it is mapped to. The
//! presets [`Modulation::pam`] and [`Modulation::qpsk`] place the points so that neighboring points
//! differ in one bit (Gray labeling).

use serde::{Deserialize, Serialize};

use crate::llr::{bit_metric, maxstar, INF};
use crate::{Bit, DecoderAlgorithm, Error};

/// Constellation description used for (de)serialization
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
struct ModulationDefinition {
    /// Coordinates of each point
    constellation: Vec<Vec<f64>>,
}

/// Memoryless modulation with a constellation of `2^word_width` points
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(try_from = "ModulationDefinition", into = "ModulationDefinition")]
pub struct Modulation {
    /// Coordinates of each point
    points: Vec<Vec<f64>>,
    /// Number of coordinates per point
    dimension: usize,
    /// Number of bits per point
    word_width: usize,
}

impl Modulation {
    /// Returns modulation with given constellation.
    ///
    /// # Parameters
    ///
    /// - `constellation`: Coordinates of each point, with the point at index `i` carrying the word
    ///   whose bits are the binary representation of `i`.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of points is not a power of two greater than `1`, if the
    /// points do not all have the same positive number of coordinates, or if a coordinate is not
    /// finite.
    pub fn new(constellation: &[Vec<f64>]) -> Result<Self, Error> {
        Self::try_from(ModulationDefinition {
            constellation: constellation.to_vec(),
        })
    }

    /// Returns binary phase-shift keying, mapping `Zero` to `+1` and `One` to `-1`.
    #[must_use]
    pub fn bpsk() -> Self {
        Self {
            points: vec![vec![1.0], vec![-1.0]],
            dimension: 1,
            word_width: 1,
        }
    }

    /// Returns Gray-labeled pulse-amplitude modulation with `2^bits_per_symbol` levels and unit
    /// average power.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits_per_symbol` is `0` or larger than `16`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fecodec::Modulation;
    ///
    /// let pam4 = Modulation::pam(2)?;
    /// assert_eq!(pam4.word_width(), 2);
    /// assert!((pam4.avg_power() - 1.0).abs() < 1e-12);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn pam(bits_per_symbol: usize) -> Result<Self, Error> {
        if bits_per_symbol == 0 || bits_per_symbol > 16 {
            return Err(Error::InvalidInput(format!(
                "Bits per PAM symbol must be between 1 and 16 (found {bits_per_symbol})"
            )));
        }
        let level_count = 1usize << bits_per_symbol;
        #[allow(clippy::cast_precision_loss)]
        let scale = (3.0 / (level_count * level_count - 1) as f64).sqrt();
        let mut points = vec![Vec::new(); level_count];
        for level in 0 .. level_count {
            #[allow(clippy::cast_precision_loss)]
            let amplitude = (level_count - 1) as f64 - 2.0 * level as f64;
            points[level ^ (level >> 1)] = vec![scale * amplitude];
        }
        Ok(Self {
            points,
            dimension: 1,
            word_width: bits_per_symbol,
        })
    }

    /// Returns Gray-labeled quadrature phase-shift keying with unit average power: bit `0` sets
    /// the sign of the first coordinate and bit `1` the sign of the second.
    #[must_use]
    pub fn qpsk() -> Self {
        let a = std::f64::consts::FRAC_1_SQRT_2;
        Self {
            points: vec![vec![a, a], vec![-a, a], vec![a, -a], vec![-a, -a]],
            dimension: 2,
            word_width: 2,
        }
    }

    /// Returns number of bits per point.
    #[must_use]
    pub fn word_width(&self) -> usize {
        self.word_width
    }

    /// Returns number of coordinates per point.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns number of points.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Returns coordinates of each point.
    #[must_use]
    pub fn constellation(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Returns average squared norm of the points.
    #[must_use]
    pub fn avg_power(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let count = self.points.len() as f64;
        self.points.iter().map(|p| sq_norm(p)).sum::<f64>() / count
    }

    /// Returns largest squared norm of the points.
    #[must_use]
    pub fn peak_power(&self) -> f64 {
        self.points.iter().map(|p| sq_norm(p)).fold(0.0, f64::max)
    }

    /// Returns smallest Euclidean distance between two points.
    #[must_use]
    pub fn min_distance(&self) -> f64 {
        let mut min_sq_dist = INF;
        for (i, p) in self.points.iter().enumerate() {
            for q in &self.points[i + 1 ..] {
                min_sq_dist = min_sq_dist.min(sq_distance(p, q));
            }
        }
        min_sq_dist.sqrt()
    }

    /// Returns coordinates of the points carrying given bits.
    ///
    /// # Errors
    ///
    /// Returns an error if `bits.len()` is not a multiple of `self.word_width()`.
    pub fn modulate(&self, bits: &[Bit]) -> Result<Vec<f64>, Error> {
        if bits.len() % self.word_width != 0 {
            return Err(Error::InvalidInput(format!(
                "Number of bits ({}) must be a multiple of {}",
                bits.len(),
                self.word_width
            )));
        }
        Ok(bits
            .chunks(self.word_width)
            .flat_map(|word| {
                let label = word
                    .iter()
                    .enumerate()
                    .fold(0, |acc, (j, &b)| acc | (b.index() << j));
                self.points[label].iter().copied()
            })
            .collect())
    }

    /// Returns bit LLR values for received symbols corrupted by Gaussian noise.
    ///
    /// # Parameters
    ///
    /// - `symbols`: Received coordinates, `self.dimension()` per symbol.
    ///
    /// - `noise_var`: Noise variance per coordinate.
    ///
    /// - `algo`: Evaluation of the sum over points, either exact or max-log.
    ///
    /// # Errors
    ///
    /// Returns an error if `symbols.len()` is not a multiple of `self.dimension()` or if
    /// `noise_var` is not a positive finite number.
    pub fn demodulate(
        &self,
        symbols: &[f64],
        noise_var: f64,
        algo: DecoderAlgorithm,
    ) -> Result<Vec<f64>, Error> {
        let prior_llr = vec![0.0; symbols.len() / self.dimension * self.word_width];
        self.demodulate_with_prior(symbols, &prior_llr, noise_var, algo)
    }

    /// Returns extrinsic bit LLR values for received symbols, given prior LLR values of the bits.
    ///
    /// The prior of each bit enters the metric of every point, and is removed from the output
    /// LLR of that bit.
    ///
    /// # Errors
    ///
    /// Returns an error if `symbols.len()` is not a multiple of `self.dimension()`, if
    /// `prior_llr` does not hold `self.word_width()` values per symbol, or if `noise_var` is not a
    /// positive finite number.
    pub fn demodulate_with_prior(
        &self,
        symbols: &[f64],
        prior_llr: &[f64],
        noise_var: f64,
        algo: DecoderAlgorithm,
    ) -> Result<Vec<f64>, Error> {
        if symbols.len() % self.dimension != 0 {
            return Err(Error::InvalidInput(format!(
                "Number of coordinates ({}) must be a multiple of {}",
                symbols.len(),
                self.dimension
            )));
        }
        let num_symbols = symbols.len() / self.dimension;
        if prior_llr.len() != num_symbols * self.word_width {
            return Err(Error::InvalidInput(format!(
                "Expected {} prior LLR values (found {})",
                num_symbols * self.word_width,
                prior_llr.len()
            )));
        }
        if !(noise_var.is_finite() && noise_var > 0.0) {
            return Err(Error::InvalidInput(format!(
                "Noise variance must be a positive number (found {noise_var})"
            )));
        }
        let mut bits_llr = Vec::with_capacity(prior_llr.len());
        let mut zero_metrics = vec![-INF; self.word_width];
        let mut one_metrics = vec![-INF; self.word_width];
        for (symbol, prior) in symbols
            .chunks(self.dimension)
            .zip(prior_llr.chunks(self.word_width))
        {
            zero_metrics.fill(-INF);
            one_metrics.fill(-INF);
            for (label, point) in self.points.iter().enumerate() {
                let metric = -sq_distance(symbol, point) / (2.0 * noise_var)
                    + prior
                        .iter()
                        .enumerate()
                        .map(|(j, &llr)| bit_metric(Bit::from_lsb(label >> j), llr))
                        .sum::<f64>();
                for j in 0 .. self.word_width {
                    let acc = match Bit::from_lsb(label >> j) {
                        Bit::Zero => &mut zero_metrics[j],
                        Bit::One => &mut one_metrics[j],
                    };
                    *acc = maxstar(*acc, metric, algo);
                }
            }
            bits_llr.extend(
                (0 .. self.word_width).map(|j| zero_metrics[j] - one_metrics[j] - prior[j]),
            );
        }
        Ok(bits_llr)
    }
}

impl TryFrom<ModulationDefinition> for Modulation {
    type Error = Error;

    fn try_from(definition: ModulationDefinition) -> Result<Self, Error> {
        let points = definition.constellation;
        let count = points.len();
        if count < 2 || !count.is_power_of_two() {
            return Err(Error::InvalidInput(format!(
                "Number of constellation points must be a power of 2 greater than 1 (found {count})"
            )));
        }
        let dimension = points[0].len();
        if dimension == 0 || points.iter().any(|p| p.len() != dimension) {
            return Err(Error::InvalidInput(
                "Constellation points must have the same positive number of coordinates"
                    .to_string(),
            ));
        }
        if points.iter().flatten().any(|x| !x.is_finite()) {
            return Err(Error::InvalidInput(
                "Constellation coordinates must be finite".to_string(),
            ));
        }
        Ok(Self {
            points,
            dimension,
            word_width: count.trailing_zeros() as usize,
        })
    }
}

impl From<Modulation> for ModulationDefinition {
    fn from(modulation: Modulation) -> Self {
        Self {
            constellation: modulation.points,
        }
    }
}

/// Returns squared Euclidean norm.
fn sq_norm(x: &[f64]) -> f64 {
    x.iter().map(|a| a * a).sum()
}

/// Returns squared Euclidean distance.
fn sq_distance(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum()
}
