//! Online ARIMA request forecaster.
//!
//! A streaming auto-regressive model updated one sample at a time via
//! recursive least squares: the running pseudo-inverse `A` gets a
//! Sherman-Morrison rank-one update, then the coefficient vector takes a
//! gradient step against the updated inverse. Forecasts are clipped at 0 so
//! request-rate estimates stay non-negative.

use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::warn;

// Sherman-Morrison denominators below this are treated as ill-conditioned
// and the whole update is skipped for the tick.
const DENOM_GUARD: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct OnlineArima {
    mk: usize,
    lrate: f64,
    w: Vec<f64>,
    a: Vec<f64>, // mk x mk, row-major
    data: Vec<f64>,
    forecasts: Vec<f64>,
}

impl OnlineArima {
    pub fn new(mk: usize, lrate: f64, epsilon: f64, init_w: Vec<f64>) -> Self {
        debug_assert!(mk > 0);
        debug_assert_eq!(init_w.len(), mk);
        let mut a = vec![0.0; mk * mk];
        for i in 0..mk {
            a[i * mk + i] = epsilon;
        }
        Self { mk, lrate, w: init_w, a, data: Vec::new(), forecasts: Vec::new() }
    }

    /// Seeded construction: repeated runs start from identical coefficients.
    pub fn seeded(mk: usize, lrate: f64, epsilon: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let w = (0..mk).map(|_| rng.gen::<f64>() / 1000.0).collect();
        Self::new(mk, lrate, epsilon, w)
    }

    /// Consume one observation, emit a one-step-ahead forecast.
    ///
    /// The boolean is the stability flag: `false` until `mk` prior samples
    /// exist (the observation itself is echoed back as the "forecast"),
    /// `true` from then on.
    pub fn update(&mut self, x: f64) -> (f64, bool) {
        self.data.push(x);
        let n = self.data.len();
        if n <= self.mk {
            return (x, false);
        }

        let prev = self.data[n - self.mk - 1..n - 1].to_vec();
        let prev_forecast = self
            .forecasts
            .last()
            .copied()
            .unwrap_or_else(|| dot(&self.w, &prev));
        let diff = prev_forecast - x;
        let grad: Vec<f64> = prev.iter().map(|p| 2.0 * diff * p).collect();

        // A is symmetric, so A.gradT.grad.A collapses to the outer product
        // of u = A.grad with itself.
        let u = self.mat_vec(&grad);
        let denom = 1.0 + dot(&grad, &u);
        if denom.is_finite() && denom.abs() > DENOM_GUARD {
            for i in 0..self.mk {
                for j in 0..self.mk {
                    self.a[i * self.mk + j] -= u[i] * u[j] / denom;
                }
            }
            // The gradient step must see the updated inverse.
            let step = self.mat_vec(&grad);
            for i in 0..self.mk {
                self.w[i] -= self.lrate * step[i];
            }
        } else {
            warn!(denom, "ill-conditioned rank-one update skipped");
        }

        let forecast = dot(&self.w, &self.data[n - self.mk..]).max(0.0);
        self.forecasts.push(forecast);
        (forecast, true)
    }

    pub fn observations(&self) -> usize {
        self.data.len()
    }

    pub fn latest_forecast(&self) -> Option<f64> {
        self.forecasts.last().copied()
    }

    fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        (0..self.mk)
            .map(|i| dot(&self.a[i * self.mk..(i + 1) * self.mk], v))
            .collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OnlineArima {
        OnlineArima::seeded(10, 0.1, 1e-4, 42)
    }

    #[test]
    fn stability_flag_flips_after_mk_samples() {
        let mut m = model();
        for i in 0..10 {
            let (echo, stable) = m.update(10.0);
            assert!(!stable, "sample {i} should not be stable yet");
            assert_eq!(echo, 10.0);
        }
        let (_, stable) = m.update(10.0);
        assert!(stable);
        // and it stays stable
        for _ in 0..20 {
            let (_, stable) = m.update(7.0);
            assert!(stable);
        }
    }

    #[test]
    fn forecasts_never_negative() {
        let mut m = model();
        let samples = [3.0, 0.0, 14.0, 2.0, 90.0, 1.0, 0.0, 55.0, 8.0, 2.0, 31.0, 0.0, 4.0, 120.0, 6.0];
        for x in samples {
            let (forecast, _) = m.update(x);
            assert!(forecast >= 0.0, "forecast {forecast} went negative");
        }
    }

    #[test]
    fn zero_stream_stays_at_zero() {
        let mut m = model();
        for _ in 0..40 {
            let (forecast, _) = m.update(0.0);
            assert!(forecast.is_finite());
            assert_eq!(forecast, 0.0);
        }
        assert_eq!(m.latest_forecast(), Some(0.0));
    }

    #[test]
    fn seeded_models_are_reproducible() {
        let mut a = model();
        let mut b = model();
        for x in [5.0, 9.0, 2.0, 8.0, 1.0, 6.0, 3.0, 7.0, 4.0, 10.0, 11.0, 12.0] {
            assert_eq!(a.update(x), b.update(x));
        }
    }

    #[test]
    fn observation_count_tracks_stream() {
        let mut m = model();
        assert_eq!(m.observations(), 0);
        m.update(1.0);
        m.update(2.0);
        assert_eq!(m.observations(), 2);
        assert_eq!(m.latest_forecast(), None);
    }
}
