use nalgebra::{SMatrix, SVector};

/// State vector (x, y, w, h, vx, vy, vw, vh).
pub type StateMean = SVector<f32, 8>;
pub type StateCovariance = SMatrix<f32, 8, 8>;
/// Box measurement in `[x, y, w, h]` form.
pub type Measurement = SVector<f32, 4>;

/// Chi-square 0.95 quantiles for 1 to 9 degrees of freedom.
const CHI2INV95: [f32; 9] = [
    3.8415, 5.9915, 7.8147, 9.4877, 11.070, 12.592, 14.067, 15.507, 16.919,
];

/// Chi-square 0.95 inverse cumulative distribution, usable as a gate on
/// `KalmanFilter::gating_distance`.
pub fn chi2inv95(n_dof: usize) -> Option<f32> {
    CHI2INV95.get(n_dof.checked_sub(1)?).copied()
}

/// Constant-velocity Kalman filter over box position and size.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: SMatrix<f32, 8, 8>,
    update_mat: SMatrix<f32, 4, 8>,
    std_weight_position: f32,
    std_weight_velocity: f32,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let ndim = 4;
        let dt = 1.0;
        let mut motion_mat = SMatrix::<f32, 8, 8>::identity();
        for i in 0..ndim {
            motion_mat[(i, ndim + i)] = dt;
        }
        KalmanFilter {
            motion_mat,
            update_mat: SMatrix::<f32, 4, 8>::identity(),
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Noise scales with box size; keep it away from zero for tiny boxes.
    fn size_scale(mean: &StateMean) -> (f32, f32) {
        (mean[2].abs().max(1.0), mean[3].abs().max(1.0))
    }

    /// Create a track state from an unassociated measurement. Velocities start at zero.
    pub fn initiate(&self, measurement: &Measurement) -> (StateMean, StateCovariance) {
        let mut mean = StateMean::zeros();
        mean.fixed_rows_mut::<4>(0).copy_from(measurement);
        let (w, h) = Self::size_scale(&mean);
        let std = StateMean::from_column_slice(&[
            2.0 * self.std_weight_position * w,
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * w,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * w,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * w,
            10.0 * self.std_weight_velocity * h,
        ]);
        let covariance = StateCovariance::from_diagonal(&std.component_mul(&std));
        (mean, covariance)
    }

    /// Predict step: x' = F x, P' = F P F^T + Q
    pub fn predict(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (StateMean, StateCovariance) {
        let (w, h) = Self::size_scale(mean);
        let q_vec = StateMean::from_column_slice(&[
            self.std_weight_position * w,
            self.std_weight_position * h,
            self.std_weight_position * w,
            self.std_weight_position * h,
            self.std_weight_velocity * w,
            self.std_weight_velocity * h,
            self.std_weight_velocity * w,
            self.std_weight_velocity * h,
        ]);
        let q = StateCovariance::from_diagonal(&q_vec.component_mul(&q_vec));

        let new_mean = self.motion_mat * mean;
        let new_cov = self.motion_mat * covariance * self.motion_mat.transpose() + q;
        (new_mean, new_cov)
    }

    /// Project state to measurement space: z = Hx, S = H P H^T + R
    pub fn project(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
    ) -> (Measurement, SMatrix<f32, 4, 4>) {
        let (w, h) = Self::size_scale(mean);
        let std = Measurement::new(
            self.std_weight_position * w,
            self.std_weight_position * h,
            self.std_weight_position * w,
            self.std_weight_position * h,
        );
        let r = SMatrix::<f32, 4, 4>::from_diagonal(&std.component_mul(&std));

        let z_mean = self.update_mat * mean;
        let s_cov = self.update_mat * covariance * self.update_mat.transpose() + r;
        (z_mean, s_cov)
    }

    /// Correction step. A projected covariance that is not positive definite
    /// leaves the state unchanged.
    pub fn update(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurement: &Measurement,
    ) -> (StateMean, StateCovariance) {
        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let Some(chol) = projected_cov.cholesky() else {
            tracing::warn!("projected covariance is not positive definite; skipping correction");
            return (*mean, *covariance);
        };

        // K = P H^T S^-1, solved as S K^T = H P^T
        let pht = covariance * self.update_mat.transpose();
        let kalman_gain = chol.solve(&pht.transpose()).transpose();

        let innovation = measurement - projected_mean;
        let new_mean = mean + kalman_gain * innovation;
        let new_cov = covariance - kalman_gain * projected_cov * kalman_gain.transpose();
        (new_mean, new_cov)
    }

    /// Squared Mahalanobis distance between the projected state and each
    /// measurement. Compare against `chi2inv95(4)`.
    pub fn gating_distance(
        &self,
        mean: &StateMean,
        covariance: &StateCovariance,
        measurements: &[Measurement],
    ) -> Vec<f32> {
        let (z_mean, s_cov) = self.project(mean, covariance);
        let Some(chol) = s_cov.cholesky() else {
            return vec![f32::INFINITY; measurements.len()];
        };
        measurements
            .iter()
            .map(|z| {
                let d = z - z_mean;
                d.dot(&chol.solve(&d))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kalman_filter_initiate() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate(&Measurement::new(100.0, 100.0, 50.0, 50.0));

        assert_eq!(mean.fixed_rows::<4>(0), Measurement::new(100.0, 100.0, 50.0, 50.0));
        assert_eq!(mean.fixed_rows::<4>(4), Measurement::zeros());

        // Covariance should be diagonal with positive uncertainty
        for i in 0..8 {
            for j in 0..8 {
                if i == j {
                    assert!(covariance[(i, j)] > 0.0);
                } else {
                    assert_eq!(covariance[(i, j)], 0.0);
                }
            }
        }
    }

    #[test]
    fn test_kalman_predict() {
        let kf = KalmanFilter::new();
        let (mut mean, covariance) = kf.initiate(&Measurement::new(100.0, 100.0, 50.0, 50.0));

        // Position should stay put with zero initial velocity
        let (pred_mean, pred_cov) = kf.predict(&mean, &covariance);
        assert_relative_eq!(pred_mean[0], 100.0, epsilon = 1e-5);
        assert_relative_eq!(pred_mean[1], 100.0, epsilon = 1e-5);
        assert!(pred_cov[(0, 0)] > covariance[(0, 0)]);

        // With velocity set, position advances by one step
        mean[4] = 10.0;
        mean[5] = 5.0;
        let (pred_mean, _) = kf.predict(&mean, &covariance);
        assert_relative_eq!(pred_mean[0], 110.0);
        assert_relative_eq!(pred_mean[1], 105.0);
        assert_relative_eq!(pred_mean[2], 50.0);
        assert_relative_eq!(pred_mean[3], 50.0);
        assert_relative_eq!(pred_mean[4], 10.0);
        assert_relative_eq!(pred_mean[5], 5.0);
    }

    #[test]
    fn test_kalman_update() {
        let kf = KalmanFilter::new();
        let (mean, covariance) = kf.initiate(&Measurement::new(100.0, 100.0, 50.0, 50.0));

        let measurement = Measurement::new(110.0, 105.0, 52.0, 48.0);
        let (new_mean, new_cov) = kf.update(&mean, &covariance, &measurement);

        // State should land between prediction and measurement
        assert!(new_mean[0] > 100.0 && new_mean[0] < 110.0);
        assert!(new_mean[1] > 100.0 && new_mean[1] < 105.0);
        assert!(new_mean[2] > 50.0 && new_mean[2] < 52.0);
        assert!(new_mean[3] > 48.0 && new_mean[3] < 50.0);

        // Covariance shrinks after a measurement
        assert!(new_cov[(0, 0)] < covariance[(0, 0)]);
        assert!(new_cov.diagonal().norm() < covariance.diagonal().norm());
    }

    #[test]
    fn test_velocity_is_learned() {
        let kf = KalmanFilter::new();
        let (mut mean, mut cov) = kf.initiate(&Measurement::new(0.0, 0.0, 40.0, 40.0));
        for step in 1..=20 {
            let (m, c) = kf.predict(&mean, &cov);
            let z = Measurement::new(5.0 * step as f32, 0.0, 40.0, 40.0);
            (mean, cov) = kf.update(&m, &c, &z);
        }
        assert_relative_eq!(mean[4], 5.0, epsilon = 1.0);
    }

    #[test]
    fn test_gating_distance() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate(&Measurement::new(100.0, 100.0, 50.0, 50.0));
        let d = kf.gating_distance(
            &mean,
            &cov,
            &[
                Measurement::new(100.0, 100.0, 50.0, 50.0),
                Measurement::new(101.0, 100.0, 50.0, 50.0),
                Measurement::new(400.0, 400.0, 50.0, 50.0),
            ],
        );
        assert_relative_eq!(d[0], 0.0);
        assert!(d[1] > 0.0 && d[1] < d[2]);
        assert!(d[2] > chi2inv95(4).unwrap());
    }

    #[test]
    fn test_chi2inv95() {
        assert_eq!(chi2inv95(0), None);
        assert_eq!(chi2inv95(10), None);
        assert!(chi2inv95(2).unwrap() > chi2inv95(1).unwrap());
        assert!(chi2inv95(4).unwrap() > chi2inv95(3).unwrap());
    }
}
