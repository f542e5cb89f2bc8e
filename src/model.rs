//! Wicket classifier: one-hot + standardized features into a class-balanced
//! logistic regression fitted by batch gradient descent.

use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result};
use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use thiserror::Error;

use crate::{
    cli::TrainArgs,
    frame::{Table, Value},
    io_utils, table,
};

pub const TARGET_COLUMN: &str = "wicket";
pub const NUMERIC_FEATURES: [&str; 1] = ["runs_cumulative"];
pub const CATEGORICAL_FEATURES: [&str; 4] = ["inning", "over", "powerplay", "over_ball"];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Column '{column}' must be in the dataset")]
    MissingColumn { column: String },
    #[error("Dataset shouldn't be empty")]
    EmptyDataset,
    #[error("Need at least two rows to split into train and test sets")]
    TooFewRows,
    #[error("Row {row} has no numeric value in column '{column}'")]
    InvalidValue { column: String, row: usize },
    #[error("Training data holds only one class of 'wicket'")]
    SingleClass,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub train_fraction: f64,
    pub seed: u64,
    pub learning_rate: f64,
    pub epochs: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            seed: 123,
            learning_rate: 0.5,
            epochs: 300,
        }
    }
}

/// Feature columns pulled out of a dataset, one entry per row.
#[derive(Debug, Clone)]
struct RawFeatures {
    numeric: Vec<Vec<f64>>,
    categorical: Vec<Vec<String>>,
    target: Vec<u8>,
}

impl RawFeatures {
    fn from_table(dataset: &Table) -> Result<Self, ModelError> {
        let column = |name: &str| {
            dataset
                .column(name)
                .ok_or_else(|| ModelError::MissingColumn {
                    column: name.to_string(),
                })
        };
        for name in NUMERIC_FEATURES
            .iter()
            .chain(CATEGORICAL_FEATURES.iter())
            .chain(std::iter::once(&TARGET_COLUMN))
        {
            column(*name)?;
        }

        let rows = dataset.row_count();
        let mut numeric = vec![Vec::with_capacity(NUMERIC_FEATURES.len()); rows];
        for name in NUMERIC_FEATURES {
            let values = column(name)?;
            for (row, slot) in numeric.iter_mut().enumerate() {
                let value = values
                    .get(row)
                    .and_then(Value::as_f64)
                    .ok_or_else(|| ModelError::InvalidValue {
                        column: name.to_string(),
                        row,
                    })?;
                slot.push(value);
            }
        }

        let mut categorical = vec![Vec::with_capacity(CATEGORICAL_FEATURES.len()); rows];
        for name in CATEGORICAL_FEATURES {
            let values = column(name)?;
            for (row, slot) in categorical.iter_mut().enumerate() {
                slot.push(values.get(row).map(Value::as_display).unwrap_or_default());
            }
        }

        let targets = column(TARGET_COLUMN)?;
        let target = (0..rows)
            .map(|row| match targets.get(row).and_then(Value::as_i64) {
                Some(0) => Ok(0),
                Some(_) => Ok(1),
                None => Err(ModelError::InvalidValue {
                    column: TARGET_COLUMN.to_string(),
                    row,
                }),
            })
            .collect::<Result<Vec<u8>, _>>()?;

        Ok(Self {
            numeric,
            categorical,
            target,
        })
    }
}

/// Standard scaling for numeric features and one-hot encoding for
/// categorical ones, fitted on the training rows only.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessor {
    scales: Vec<(f64, f64)>,
    levels: Vec<Vec<String>>,
}

impl Preprocessor {
    fn fit(numeric: &[&Vec<f64>], categorical: &[&Vec<String>]) -> Self {
        let n = numeric.len().max(1) as f64;
        let scales = (0..NUMERIC_FEATURES.len())
            .map(|feature| {
                let mean = numeric.iter().map(|row| row[feature]).sum::<f64>() / n;
                let variance = numeric
                    .iter()
                    .map(|row| (row[feature] - mean).powi(2))
                    .sum::<f64>()
                    / n;
                let sd = variance.sqrt();
                (mean, if sd > 0.0 { sd } else { 1.0 })
            })
            .collect();

        let levels = (0..CATEGORICAL_FEATURES.len())
            .map(|feature| {
                let seen = categorical
                    .iter()
                    .map(|row| row[feature].clone())
                    .collect::<BTreeSet<_>>();
                let mut levels = seen.into_iter().collect::<Vec<_>>();
                // Binary features keep a single indicator.
                if levels.len() == 2 {
                    levels.remove(0);
                }
                levels
            })
            .collect();

        Self { scales, levels }
    }

    pub fn width(&self) -> usize {
        self.scales.len() + self.levels.iter().map(Vec::len).sum::<usize>()
    }

    /// Unseen categories encode as all zeros.
    fn transform(&self, numeric: &[f64], categorical: &[String]) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.width());
        for (value, (mean, sd)) in numeric.iter().zip(&self.scales) {
            encoded.push((value - mean) / sd);
        }
        for (value, levels) in categorical.iter().zip(&self.levels) {
            encoded.extend(levels.iter().map(|level| f64::from(u8::from(level == value))));
        }
        encoded
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub preprocessor: Preprocessor,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl TrainedModel {
    fn probability(&self, encoded: &[f64]) -> f64 {
        let z = encoded
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        sigmoid(z)
    }

    fn predict(&self, encoded: &[f64]) -> u8 {
        u8::from(self.probability(encoded) >= 0.5)
    }
}

/// Rows are actual class, columns predicted class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix(pub [[usize; 2]; 2]);

impl ConfusionMatrix {
    pub fn record(&mut self, actual: u8, predicted: u8) {
        self.0[usize::from(actual)][usize::from(predicted)] += 1;
    }

    pub fn total(&self) -> usize {
        self.0.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.0[0][0] + self.0[1][1]) as f64 / total as f64
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.0
            .iter()
            .enumerate()
            .map(|(actual, counts)| {
                vec![
                    actual.to_string(),
                    counts[0].to_string(),
                    counts[1].to_string(),
                ]
            })
            .collect()
    }

    pub fn headers() -> Vec<String> {
        vec![
            "actual".to_string(),
            "predicted_0".to_string(),
            "predicted_1".to_string(),
        ]
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path)?;
        writer
            .write_record(Self::headers())
            .context("Writing confusion matrix headers")?;
        for row in self.rows() {
            writer
                .write_record(&row)
                .context("Writing confusion matrix row")?;
        }
        writer.flush().context("Flushing confusion matrix")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

pub fn execute(args: &TrainArgs) -> Result<()> {
    let dataset = io_utils::read_table(&args.input)
        .with_context(|| format!("Loading dataset from {:?}", args.input))?;
    let config = ModelConfig {
        train_fraction: args.train_fraction,
        seed: args.seed,
        ..ModelConfig::default()
    };
    let (_, evaluation) = train_and_evaluate(&dataset, &config)?;
    println!("Model score: {:.4}", evaluation.accuracy);
    table::print_table(&ConfusionMatrix::headers(), &evaluation.confusion.rows());
    if let Some(path) = &args.confusion_matrix {
        evaluation
            .confusion
            .save(path)
            .with_context(|| format!("Saving confusion matrix to {path:?}"))?;
        info!("Confusion matrix saved to {path:?}");
    }
    Ok(())
}

pub fn train_and_evaluate(
    dataset: &Table,
    config: &ModelConfig,
) -> Result<(TrainedModel, Evaluation), ModelError> {
    let features = RawFeatures::from_table(dataset)?;
    let rows = features.target.len();
    match rows {
        0 => return Err(ModelError::EmptyDataset),
        1 => return Err(ModelError::TooFewRows),
        _ => {}
    }

    let mut order = (0..rows).collect::<Vec<_>>();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));
    let train_rows = ((rows as f64 * config.train_fraction).round() as usize).clamp(1, rows - 1);
    let (train, test) = order.split_at(train_rows);
    debug!("Split {rows} row(s) into {} train / {} test", train.len(), test.len());

    let preprocessor = Preprocessor::fit(
        &train.iter().map(|&i| &features.numeric[i]).collect::<Vec<_>>(),
        &train.iter().map(|&i| &features.categorical[i]).collect::<Vec<_>>(),
    );
    let encode = |i: usize| preprocessor.transform(&features.numeric[i], &features.categorical[i]);

    let x_train = train.iter().map(|&i| encode(i)).collect::<Vec<_>>();
    let y_train = train.iter().map(|&i| features.target[i]).collect::<Vec<_>>();
    let (weights, bias) = fit_logistic_regression(&x_train, &y_train, config)?;
    let model = TrainedModel {
        preprocessor: preprocessor.clone(),
        weights,
        bias,
    };

    let mut confusion = ConfusionMatrix::default();
    for &i in test {
        confusion.record(features.target[i], model.predict(&encode(i)));
    }
    let evaluation = Evaluation {
        accuracy: confusion.accuracy(),
        confusion,
    };
    info!(
        "Trained on {} row(s), accuracy {:.4} over {} test row(s)",
        train.len(),
        evaluation.accuracy,
        test.len()
    );
    Ok((model, evaluation))
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Gradient descent on weighted log-loss, each class weighted by
/// `n / (2 * n_class)`.
fn fit_logistic_regression(
    features: &[Vec<f64>],
    targets: &[u8],
    config: &ModelConfig,
) -> Result<(Vec<f64>, f64), ModelError> {
    let positives = targets.iter().filter(|&&y| y == 1).count();
    let negatives = targets.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(ModelError::SingleClass);
    }
    let n = targets.len() as f64;
    let class_weight = [n / (2.0 * negatives as f64), n / (2.0 * positives as f64)];

    let width = features.first().map(Vec::len).unwrap_or(0);
    let mut weights = vec![0.0; width];
    let mut bias = 0.0;
    for _ in 0..config.epochs {
        let mut weight_gradients = vec![0.0; width];
        let mut bias_gradient = 0.0;
        for (row, &target) in features.iter().zip(targets) {
            let z = row.iter().zip(&weights).map(|(x, w)| x * w).sum::<f64>() + bias;
            let error = (sigmoid(z) - f64::from(target)) * class_weight[usize::from(target)];
            for (gradient, x) in weight_gradients.iter_mut().zip(row) {
                *gradient += error * x;
            }
            bias_gradient += error;
        }
        for (weight, gradient) in weights.iter_mut().zip(&weight_gradients) {
            *weight -= config.learning_rate * gradient / n;
        }
        bias -= config.learning_rate * bias_gradient / n;
    }
    Ok((weights, bias))
}
