use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{database::db_structs::EntityId, model::polyrating::state_space::LatentKey};

/// Latest occurrence of one latent covered by a [`JointPosterior`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarriedLatent {
    pub key: LatentKey,
    /// Period of the occurrence the mean refers to
    pub period: usize,
    /// Internal scale
    pub mean: f64
}

/// Gaussian posterior over the latest occurrence of every latent seen up to
/// the end of `period`, with full covariance (internal scale).
///
/// A bounded window starts its fit from this instead of per-latent
/// marginals, so the correlations built up before the window survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointPosterior {
    pub period: usize,
    pub latents: Vec<CarriedLatent>,
    /// Row-major, `latents.len()` squared entries
    pub covariance: Vec<f64>
}

impl JointPosterior {
    pub fn new(period: usize, latents: Vec<CarriedLatent>, covariance: &DMatrix<f64>) -> JointPosterior {
        let n = latents.len();
        let covariance = (0..n).flat_map(|i| (0..n).map(move |j| covariance[(i, j)])).collect();

        JointPosterior {
            period,
            latents,
            covariance
        }
    }

    pub fn len(&self) -> usize {
        self.latents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latents.is_empty()
    }

    pub fn covariance_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.len(), self.len(), &self.covariance)
    }

    /// Marginalises out every latent belonging to `entity_id`.
    pub fn without_entity(&self, entity_id: EntityId) -> JointPosterior {
        let keep: Vec<usize> = self
            .latents
            .iter()
            .enumerate()
            .filter(|(_, latent)| latent.key.entity() != Some(entity_id))
            .map(|(i, _)| i)
            .collect();

        let n = self.len();
        JointPosterior {
            period: self.period,
            latents: keep.iter().map(|i| self.latents[*i].clone()).collect(),
            covariance: keep
                .iter()
                .flat_map(|i| keep.iter().map(move |j| self.covariance[i * n + j]))
                .collect()
        }
    }
}
