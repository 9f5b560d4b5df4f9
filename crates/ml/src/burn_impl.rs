use burn::tensor::{Int, Tensor, TensorData};
use burn_ndarray::{NdArray, NdArrayDevice};

use crate::model::SequenceClassifierWeights;
use crate::ClassifierError;

type Backend = NdArray<f32>;

/// The classification head materialised as burn tensors on the CPU backend.
#[derive(Debug, Clone)]
pub(crate) struct BurnClassifierHead {
    device: NdArrayDevice,
    embeddings: Tensor<Backend, 2>,
    weight_t: Tensor<Backend, 2>,
    bias: Tensor<Backend, 1>,
}

impl BurnClassifierHead {
    pub(crate) fn new(weights: &SequenceClassifierWeights) -> Self {
        let device = NdArrayDevice::Cpu;
        let labels = weights.num_labels();

        let embeddings = Tensor::<Backend, 2>::from_data(
            TensorData::new(
                weights.embeddings.clone(),
                [weights.vocab_rows, weights.hidden_size],
            ),
            &device,
        );
        let weight_t = Tensor::<Backend, 2>::from_data(
            TensorData::new(weights.weight.clone(), [labels, weights.hidden_size]),
            &device,
        )
        .transpose();
        let bias = Tensor::<Backend, 1>::from_data(
            TensorData::new(weights.bias.clone(), [labels]),
            &device,
        );

        Self {
            device,
            embeddings,
            weight_t,
            bias,
        }
    }

    pub(crate) fn forward(&self, ids: &[u32]) -> Result<Vec<f32>, ClassifierError> {
        let indices = ids.iter().map(|id| i64::from(*id)).collect::<Vec<_>>();
        let count = indices.len();
        let indices =
            Tensor::<Backend, 1, Int>::from_data(TensorData::new(indices, [count]), &self.device);

        let pooled = self.embeddings.clone().select(0, indices).mean_dim(0);
        let logits = pooled.matmul(self.weight_t.clone()) + self.bias.clone().unsqueeze::<2>();

        logits
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| ClassifierError::Inference(format!("{err:?}")))
    }
}
