//! Log-domain arithmetic on log-likelihood-ratio (LLR) values
//!
//! All decoders in this crate work with LLR values `ln(P(Zero) / P(One))`, so that positive values
//! indicate that `Zero` is more likely. The functions in this module combine such values according
//! to a [`DecoderAlgorithm`], which trades accuracy of the Jacobian logarithm for speed.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::Bit;

/// Stand-in for infinity in path metrics (keeps all arithmetic finite)
pub(crate) const INF: f64 = 1e100;

/// Step between samples of the correction table used by [`DecoderAlgorithm::Linear`]
const LINEAR_TABLE_STEP: f64 = 0.5;

/// Number of samples in the correction table used by [`DecoderAlgorithm::Linear`]
const LINEAR_TABLE_LENGTH: usize = 16;

/// Enumeration of algorithms for evaluating the Jacobian logarithm `ln(e^x + e^y)`
#[derive(Clone, Eq, Hash, PartialEq, Debug, Copy, Default, Deserialize, Serialize)]
pub enum DecoderAlgorithm {
    /// Exact evaluation (Log-MAP, sum-product)
    Exact,
    /// Correction term read from a piecewise-linear table
    Linear,
    /// Correction term dropped (Max-Log-MAP, min-sum)
    #[default]
    Approximate,
}

impl DecoderAlgorithm {
    /// Returns the name of the variant.
    pub fn name(&self) -> &str {
        match self {
            DecoderAlgorithm::Exact => "Exact",
            DecoderAlgorithm::Linear => "Linear",
            DecoderAlgorithm::Approximate => "Approximate",
        }
    }
}

impl std::fmt::Display for DecoderAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for DecoderAlgorithm {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exact" => Ok(DecoderAlgorithm::Exact),
            "Linear" => Ok(DecoderAlgorithm::Linear),
            "Approximate" => Ok(DecoderAlgorithm::Approximate),
            _ => Err(crate::Error::InvalidInput(format!(
                "Unknown decoder algorithm {s} (expected Exact, Linear or Approximate)"
            ))),
        }
    }
}

/// Table of samples of a function, evaluated by linear interpolation
#[derive(Clone, PartialEq, Debug)]
pub struct LinearTable {
    /// Distance between consecutive samples
    step: f64,
    /// Samples at `0, step, 2 * step, ...`
    samples: Vec<f64>,
}

impl LinearTable {
    /// Returns table holding `length` samples of `f` spaced `step` apart, starting at `0`.
    ///
    /// # Errors
    ///
    /// Returns an error if `length < 2` or if `step` is not a positive finite number.
    pub fn new<F: Fn(f64) -> f64>(step: f64, length: usize, f: F) -> Result<Self, crate::Error> {
        if length < 2 || !(step.is_finite() && step > 0.0) {
            return Err(crate::Error::InvalidInput(format!(
                "Linear table needs at least 2 samples and a positive step (found {length} \
                samples, step {step})"
            )));
        }
        #[allow(clippy::cast_precision_loss)]
        let samples = (0 .. length).map(|i| f(i as f64 * step)).collect();
        Ok(Self { step, samples })
    }

    /// Returns table for the correction term `ln(1 + e^(-x))` of the Jacobian logarithm.
    #[must_use]
    pub fn log1pexp() -> Self {
        let samples = (0 .. LINEAR_TABLE_LENGTH)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f64 * LINEAR_TABLE_STEP;
                log_map_correction_term(x)
            })
            .collect();
        Self {
            step: LINEAR_TABLE_STEP,
            samples,
        }
    }

    /// Returns interpolated value at `x`, or `0` outside the tabulated range (including non-finite
    /// `x`).
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        let t = x / self.step;
        #[allow(clippy::cast_precision_loss)]
        let last = (self.samples.len() - 1) as f64;
        if !t.is_finite() || t < 0.0 || t >= last {
            return 0.0;
        }
        // OK to truncate: `t` lies in `[0, len - 1)` here.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let i = t.floor() as usize;
        #[allow(clippy::cast_precision_loss)]
        let frac = t - i as f64;
        self.samples[i] + (self.samples[i + 1] - self.samples[i]) * frac
    }

    /// Returns number of samples in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the table holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Returns shared correction table for the Linear algorithm.
fn correction_table() -> &'static LinearTable {
    static TABLE: OnceLock<LinearTable> = OnceLock::new();
    TABLE.get_or_init(LinearTable::log1pexp)
}

/// Returns the correction term `ln(1 + e^(-abs_diff))` for given algorithm.
fn correction_term(abs_diff: f64, algo: DecoderAlgorithm) -> f64 {
    match algo {
        DecoderAlgorithm::Exact => log_map_correction_term(abs_diff),
        DecoderAlgorithm::Linear => correction_table().eval(abs_diff),
        DecoderAlgorithm::Approximate => 0.0,
    }
}

/// Returns the correction term for exact evaluation.
fn log_map_correction_term(abs_diff: f64) -> f64 {
    (-abs_diff).exp().ln_1p()
}

/// Returns the maxstar `ln(e^x + e^y)` of two numbers for given algorithm.
#[must_use]
pub fn maxstar(x: f64, y: f64, algo: DecoderAlgorithm) -> f64 {
    x.max(y) + correction_term((x - y).abs(), algo)
}

/// Returns the LLR of the XOR of two bits with given LLR values (the "box-plus" operation).
///
/// # Examples
///
/// ```
/// use fecodec::llr::{boxplus, DecoderAlgorithm};
///
/// assert_eq!(boxplus(-3.0, 2.0, DecoderAlgorithm::Approximate), -2.0);
/// assert_eq!(boxplus(5.0, 0.0, DecoderAlgorithm::Exact), 0.0);
/// ```
#[must_use]
pub fn boxplus(a: f64, b: f64, algo: DecoderAlgorithm) -> f64 {
    let sign = a.signum() * b.signum();
    sign * a.abs().min(b.abs()) + correction_term((a + b).abs(), algo)
        - correction_term((a - b).abs(), algo)
}

/// Returns metric for given bit corresponding to given LLR value.
#[must_use]
pub fn bit_metric(bit: Bit, llr_val: f64) -> f64 {
    match bit {
        Bit::Zero => llr_val / 2.0,
        Bit::One => -llr_val / 2.0,
    }
}

/// Returns hard decision on a bit from its LLR value (nonnegative values map to `Zero`).
#[must_use]
pub fn hard_decision(llr_val: f64) -> Bit {
    if llr_val >= 0.0 {
        Bit::Zero
    } else {
        Bit::One
    }
}

#[cfg(test)]
mod tests_of_functions {
    use float_eq::assert_float_eq;

    use super::*;

    #[test]
    fn test_decoder_algorithm_from_str() {
        assert_eq!(
            "Exact".parse::<DecoderAlgorithm>().unwrap(),
            DecoderAlgorithm::Exact
        );
        assert_eq!(
            "Approximate".parse::<DecoderAlgorithm>().unwrap(),
            DecoderAlgorithm::Approximate
        );
        assert!("LogMAP".parse::<DecoderAlgorithm>().is_err());
        assert_eq!(DecoderAlgorithm::Linear.to_string(), "Linear");
    }

    #[test]
    fn test_linear_table() {
        assert!(LinearTable::new(0.5, 1, |x| x).is_err());
        assert!(LinearTable::new(0.0, 4, |x| x).is_err());
        let table = LinearTable::new(1.0, 3, |x| x * x).unwrap();
        assert_eq!(table.len(), 3);
        assert_float_eq!(table.eval(0.5), 0.5, abs <= 1e-12);
        assert_float_eq!(table.eval(1.5), 2.5, abs <= 1e-12);
        assert_float_eq!(table.eval(2.0), 0.0, abs <= 1e-12);
        assert_float_eq!(table.eval(-1.0), 0.0, abs <= 1e-12);
    }

    #[test]
    fn test_log1pexp_table() {
        let table = LinearTable::log1pexp();
        assert_float_eq!(table.eval(0.0), std::f64::consts::LN_2, abs <= 1e-12);
        assert_float_eq!(table.eval(1.0), 0.313_261_687_518_222_8, abs <= 1e-12);
        assert_float_eq!(
            table.eval(0.25),
            0.5 * (std::f64::consts::LN_2 + 0.474_076_984_180_107_2),
            abs <= 1e-12
        );
        assert_float_eq!(table.eval(100.0), 0.0, abs <= 1e-12);
        assert_float_eq!(table.eval(2.0 * INF), 0.0, abs <= 1e-12);
        assert_float_eq!(table.eval(f64::INFINITY), 0.0, abs <= 1e-12);
        assert_float_eq!(table.eval(f64::NAN), 0.0, abs <= 1e-12);
    }

    #[test]
    fn test_linear_with_infinite_metrics() {
        let algo = DecoderAlgorithm::Linear;
        assert_float_eq!(maxstar(2.0, -INF, algo), 2.0, abs <= 1e-8);
        assert_float_eq!(maxstar(-INF, -3.5, algo), -3.5, abs <= 1e-8);
        assert_float_eq!(maxstar(INF, -INF, algo), INF, r2nd <= 1e-12);
        assert_float_eq!(boxplus(INF, -1.25, algo), -1.25, abs <= 1e-8);
        assert_float_eq!(boxplus(-INF, 0.5, algo), -0.5, abs <= 1e-8);
    }

    #[test]
    fn test_maxstar() {
        assert_float_eq!(
            maxstar(1.2, 1.3, DecoderAlgorithm::Approximate),
            1.3,
            abs <= 1e-8
        );
        assert_float_eq!(
            maxstar(-1.2, -1.3, DecoderAlgorithm::Approximate),
            -1.2,
            abs <= 1e-8
        );
        assert_float_eq!(
            maxstar(1.2, 1.3, DecoderAlgorithm::Exact),
            1.944_396_660_073_571,
            abs <= 1e-8
        );
        assert_float_eq!(
            maxstar(-1.2, -1.3, DecoderAlgorithm::Exact),
            -0.555_603_339_926_429_1,
            abs <= 1e-8
        );
        assert_float_eq!(maxstar(2.0, -INF, DecoderAlgorithm::Exact), 2.0, abs <= 1e-8);
        assert_float_eq!(
            maxstar(0.0, 0.0, DecoderAlgorithm::Linear),
            std::f64::consts::LN_2,
            abs <= 1e-8
        );
    }

    #[test]
    fn test_boxplus() {
        assert_float_eq!(
            boxplus(-3.0, 2.0, DecoderAlgorithm::Approximate),
            -2.0,
            abs <= 1e-12
        );
        assert_float_eq!(boxplus(4.0, 0.0, DecoderAlgorithm::Exact), 0.0, abs <= 1e-12);
        // Exact box-plus equals 2 * atanh(tanh(a / 2) * tanh(b / 2))
        let (a, b) = (1.5_f64, -0.7_f64);
        let exact = 2.0 * ((a / 2.0).tanh() * (b / 2.0).tanh()).atanh();
        assert_float_eq!(boxplus(a, b, DecoderAlgorithm::Exact), exact, abs <= 1e-12);
        assert!(boxplus(a, b, DecoderAlgorithm::Approximate).abs() >= exact.abs());
    }

    #[test]
    fn test_bit_metric() {
        assert_float_eq!(bit_metric(Bit::Zero, 3.0), 1.5, abs <= 1e-12);
        assert_float_eq!(bit_metric(Bit::One, 3.0), -1.5, abs <= 1e-12);
    }

    #[test]
    fn test_hard_decision() {
        assert_eq!(hard_decision(0.0), Bit::Zero);
        assert_eq!(hard_decision(0.01), Bit::Zero);
        assert_eq!(hard_decision(-0.01), Bit::One);
    }
}
