//! Random-variate generators for inter-arrival times, packet sizes and
//! processing times.
//!
//! A `Distribution` is plain data read from the scenario file; every draw
//! takes the run's RNG explicitly so the whole simulation consumes a
//! single seeded stream.
//!
//! ```json
//! {"distribution": "const", "value": 0.001}
//! {"distribution": "exp", "mean": 0.01}
//! {"distribution": "exp", "lambda": 100}
//! {"distribution": "unif", "min": 32, "max": 1460, "int": 1}
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum Distribution {
    /// Always `value`.
    Const { value: f64 },
    /// Exponential, given either its mean or its rate.
    Exp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mean: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lambda: Option<f64>,
    },
    /// Uniform in `[min, max)`, optionally floored to a multiple of `int`.
    Unif {
        min: f64,
        max: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        int: Option<f64>,
    },
}

impl Distribution {
    pub fn constant(value: f64) -> Self {
        Distribution::Const { value }
    }

    pub fn exponential(mean: f64) -> Self {
        Distribution::Exp {
            mean: Some(mean),
            lambda: None,
        }
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Distribution::Unif { min, max, int: None }
    }

    /// Reject parameter combinations that cannot be sampled.
    pub fn validate(&self) -> SimResult<()> {
        match *self {
            Distribution::Const { value } if !value.is_finite() => {
                Err(invalid(format!("constant value {value} is not finite")))
            }
            Distribution::Const { .. } => Ok(()),
            Distribution::Exp { mean, lambda } => match (mean, lambda) {
                (Some(m), None) if m.is_finite() && m > 0.0 => Ok(()),
                (None, Some(l)) if l.is_finite() && l > 0.0 => Ok(()),
                (Some(_), Some(_)) => Err(invalid("exp takes either mean or lambda, not both".into())),
                (None, None) => Err(invalid("exp needs a mean or a lambda".into())),
                _ => Err(invalid("exp mean/lambda must be positive".into())),
            },
            Distribution::Unif { min, max, int } => {
                if !(min.is_finite() && max.is_finite()) || min > max {
                    return Err(invalid(format!("unif range [{min}, {max}) is empty")));
                }
                match int {
                    Some(step) if !(step > 0.0) => {
                        Err(invalid(format!("unif step {step} must be positive")))
                    }
                    _ => Ok(()),
                }
            }
        }
    }

    /// Expected value of a draw, ignoring `int` rounding.
    pub fn mean(&self) -> f64 {
        match *self {
            Distribution::Const { value } => value,
            Distribution::Exp { mean: Some(m), .. } => m,
            Distribution::Exp { lambda: Some(l), .. } => 1.0 / l,
            Distribution::Exp { .. } => f64::NAN,
            Distribution::Unif { min, max, .. } => (min + max) / 2.0,
        }
    }

    /// Draw one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Const { value } => value,
            Distribution::Exp { .. } => {
                // Inverse transform; `1 - u` lies in (0, 1] so ln is finite.
                let u: f64 = rng.gen();
                -self.mean() * (1.0 - u).ln()
            }
            Distribution::Unif { min, max, int } => {
                let v = if min < max { rng.gen_range(min..max) } else { min };
                match int {
                    Some(step) => (v / step).floor() * step,
                    None => v,
                }
            }
        }
    }
}

fn invalid(msg: String) -> SimError {
    SimError::Config(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_const() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let d = Distribution::constant(4.5);
        assert_eq!(d.sample(&mut rng), 4.5);
        assert_eq!(d.mean(), 4.5);
    }

    #[test]
    fn test_exp_mean_close() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let d = Distribution::exponential(2.0);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| d.sample(&mut rng)).sum();
        let mean = total / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "sample mean {mean}");
    }

    #[test]
    fn test_exp_lambda_is_rate() {
        let d: Distribution =
            serde_json::from_str(r#"{"distribution": "exp", "lambda": 10}"#).unwrap();
        assert_eq!(d.mean(), 0.1);
        d.validate().unwrap();
    }

    #[test]
    fn test_unif_bounds_and_step() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let d: Distribution = serde_json::from_str(
            r#"{"distribution": "unif", "min": 32, "max": 1460, "int": 8}"#,
        )
        .unwrap();
        for _ in 0..1000 {
            let v = d.sample(&mut rng);
            assert!((32.0..1460.0).contains(&v));
            assert_eq!(v % 8.0, 0.0);
        }
    }

    #[test]
    fn test_degenerate_unif() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(Distribution::uniform(5.0, 5.0).sample(&mut rng), 5.0);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let d = Distribution::uniform(0.0, 1.0);
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        let xs: Vec<f64> = (0..10).map(|_| d.sample(&mut a)).collect();
        let ys: Vec<f64> = (0..10).map(|_| d.sample(&mut b)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_validation() {
        assert!(Distribution::uniform(3.0, 1.0).validate().is_err());
        assert!(Distribution::exponential(0.0).validate().is_err());
        assert!(Distribution::Exp { mean: None, lambda: None }.validate().is_err());
        assert!(Distribution::Exp { mean: Some(1.0), lambda: Some(1.0) }.validate().is_err());
        assert!(Distribution::Unif { min: 0.0, max: 1.0, int: Some(0.0) }.validate().is_err());
        assert!(Distribution::constant(f64::INFINITY).validate().is_err());
        assert!(Distribution::constant(0.0).validate().is_ok());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let r: Result<Distribution, _> =
            serde_json::from_str(r#"{"distribution": "gauss", "mean": 1}"#);
        assert!(r.is_err());
    }
}
