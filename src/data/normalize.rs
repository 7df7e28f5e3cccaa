//! Dataset normalization
//!
//! Brings either supported source schema into the canonical table:
//! canonical column names in canonical order, every column `Float64`
//! except `sex`, which carries its display label ("Male"/"Female").

use super::schema::{
    self, category_code, ChestPainType, Flag, HealthRecord, RestingEcg, Sex, StSlope,
    CANONICAL_COLUMNS, TARGET,
};
use crate::error::{CardioError, Result};
use crate::preprocessing::MedianImputer;
use polars::prelude::*;
use tracing::debug;

/// Column renames for the human-labeled dataset variant
const LABELED_SCHEMA: [(&str, &str); 12] = [
    ("Age", schema::AGE),
    ("Sex", schema::SEX),
    ("ChestPainType", schema::CHEST_PAIN),
    ("RestingBP", schema::RESTING_BP),
    ("Cholesterol", schema::CHOLESTEROL),
    ("FastingBS", schema::FASTING_BS),
    ("RestingECG", schema::RESTING_ECG),
    ("MaxHR", schema::MAX_HEART_RATE),
    ("ExerciseAngina", schema::EXERCISE_ANGINA),
    ("Oldpeak", schema::ST_DEPRESSION),
    ("ST_Slope", schema::ST_SLOPE),
    ("HeartDisease", schema::TARGET),
];

/// Marker column identifying the human-labeled variant
const LABELED_MARKER: &str = "Sex";

/// How category codes are numbered in the raw source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeConvention {
    /// Codes already start at zero (local canonical files, labeled variant)
    ZeroBased,
    /// UCI Cleveland numbering: `cp` 1..=4, `slope` 1..=3, `target` 0..=4
    Cleveland,
}

/// Detected layout of a raw table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    Canonical,
    Labeled,
}

impl SchemaVariant {
    pub fn detect(df: &DataFrame) -> Self {
        let is_labeled = df
            .get_column_names()
            .iter()
            .any(|name| name.as_str() == LABELED_MARKER);
        if is_labeled {
            SchemaVariant::Labeled
        } else {
            SchemaVariant::Canonical
        }
    }
}

/// Normalize a raw table into the canonical schema
pub fn normalize_frame(raw: &DataFrame, convention: CodeConvention) -> Result<DataFrame> {
    let mut df = raw.clone();
    let variant = SchemaVariant::detect(&df);
    debug!(?variant, ?convention, rows = df.height(), "Normalizing dataset");

    if variant == SchemaVariant::Labeled {
        for (from, to) in LABELED_SCHEMA {
            if has_column(&df, from) {
                df.rename(from, to.into())?;
            }
        }
    }

    let mut df = select_canonical(&df)?;

    for name in schema::CATEGORICAL_COLUMNS {
        if let Some(recoded) = recode_labels(&df, name)? {
            df.with_column(recoded)?;
        }
    }

    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    for name in &columns {
        let numeric = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        df.with_column(numeric)?;
    }

    if convention == CodeConvention::Cleveland {
        shift_codes(&mut df, schema::CHEST_PAIN, 1.0)?;
        shift_codes(&mut df, schema::ST_SLOPE, 1.0)?;
    }
    binarize_target(&mut df)?;

    let column_refs: Vec<&str> = columns.iter().map(|s| s.as_str()).collect();
    let mut imputer = MedianImputer::new();
    let mut df = imputer.fit_transform(&df, &column_refs)?;

    let labels = sex_labels(&df)?;
    df.with_column(labels)?;

    Ok(df)
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

/// Keep canonical columns in canonical order, requiring the base features and target
fn select_canonical(df: &DataFrame) -> Result<DataFrame> {
    let missing: Vec<&str> = schema::BASE_FEATURES
        .iter()
        .chain(std::iter::once(&TARGET))
        .copied()
        .filter(|name| !has_column(df, name))
        .collect();
    if !missing.is_empty() {
        return Err(CardioError::DataError(format!(
            "dataset is missing required columns {:?}",
            missing
        )));
    }

    let present: Vec<&str> = CANONICAL_COLUMNS
        .iter()
        .copied()
        .filter(|name| has_column(df, name))
        .collect();
    let dropped = df.width() - present.len();
    if dropped > 0 {
        debug!(dropped, "Ignoring non-canonical columns");
    }
    Ok(df.select(present)?)
}

/// Map string category labels to integer codes. Returns `None` for
/// columns that are already numeric.
fn recode_labels(df: &DataFrame, name: &str) -> Result<Option<Series>> {
    let series = df.column(name)?.as_materialized_series();
    if series.dtype() != &DataType::String {
        return Ok(None);
    }

    let parse = |label: &str| -> Option<f64> {
        let label = label.trim();
        let code: Option<u8> = match name {
            schema::SEX => Sex::from_short_code(label)
                .or_else(|| Sex::from_label(label))
                .map(u8::from),
            schema::CHEST_PAIN => ChestPainType::from_short_code(label).map(u8::from),
            schema::RESTING_ECG => RestingEcg::from_short_code(label).map(u8::from),
            schema::ST_SLOPE => StSlope::from_short_code(label).map(u8::from),
            schema::EXERCISE_ANGINA | schema::FASTING_BS => {
                Flag::from_short_code(label).map(u8::from)
            }
            _ => None,
        };
        code.map(f64::from).or_else(|| label.parse::<f64>().ok())
    };

    let ca = series.str()?;
    let recoded: Float64Chunked = ca
        .into_iter()
        .map(|opt| opt.and_then(|label| parse(label)))
        .collect();

    Ok(Some(recoded.with_name(series.name().clone()).into_series()))
}

fn shift_codes(df: &mut DataFrame, name: &str, offset: f64) -> Result<()> {
    let series = df.column(name)?.as_materialized_series();
    let shifted: Float64Chunked = series
        .f64()?
        .into_iter()
        .map(|opt| opt.map(|v| v - offset))
        .collect();
    let shifted = shifted.with_name(series.name().clone()).into_series();
    df.with_column(shifted)?;
    Ok(())
}

/// Collapse graded diagnoses (0 = absent, 1..=4 = present) into a binary label
fn binarize_target(df: &mut DataFrame) -> Result<()> {
    let series = df.column(TARGET)?.as_materialized_series();
    let binary: Float64Chunked = series
        .f64()?
        .into_iter()
        .map(|opt| opt.map(|v| if v > 0.0 { 1.0 } else { 0.0 }))
        .collect();
    let binary = binary.with_name(series.name().clone()).into_series();
    df.with_column(binary)?;
    Ok(())
}

fn sex_labels(df: &DataFrame) -> Result<Series> {
    let series = df.column(schema::SEX)?.as_materialized_series();
    let labels: StringChunked = series
        .f64()?
        .into_iter()
        .map(|opt| {
            opt.and_then(|code| category_code::<Sex>(schema::SEX, code).ok())
                .map(Sex::label)
        })
        .collect();
    Ok(labels.with_name(series.name().clone()).into_series())
}

/// Materialize a normalized table as typed records
pub fn records_from_frame(df: &DataFrame) -> Result<Vec<HealthRecord>> {
    let numeric = |name: &str| -> Result<Option<Vec<Option<f64>>>> {
        if !has_column(df, name) {
            return Ok(None);
        }
        let values = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .collect();
        Ok(Some(values))
    };
    let required = |name: &str| -> Result<Vec<Option<f64>>> {
        numeric(name)?.ok_or_else(|| CardioError::FeatureNotFound(name.to_string()))
    };
    let value = |column: &[Option<f64>], name: &str, row: usize| -> Result<f64> {
        column[row].ok_or_else(|| {
            CardioError::DataError(format!("missing value for '{}' in row {}", name, row))
        })
    };

    let sex_series = df.column(schema::SEX)?.as_materialized_series();
    let sexes: Vec<Option<Sex>> = sex_series
        .str()?
        .into_iter()
        .map(|opt| opt.and_then(Sex::from_label))
        .collect();

    let age = required(schema::AGE)?;
    let cp = required(schema::CHEST_PAIN)?;
    let trestbps = required(schema::RESTING_BP)?;
    let chol = required(schema::CHOLESTEROL)?;
    let fbs = required(schema::FASTING_BS)?;
    let restecg = required(schema::RESTING_ECG)?;
    let thalach = required(schema::MAX_HEART_RATE)?;
    let exang = required(schema::EXERCISE_ANGINA)?;
    let oldpeak = required(schema::ST_DEPRESSION)?;
    let slope = required(schema::ST_SLOPE)?;
    let target = required(TARGET)?;
    let ca = numeric(schema::VESSELS)?;
    let thal = numeric(schema::THALASSEMIA)?;

    (0..df.height())
        .map(|row| {
            let sex = sexes[row].ok_or_else(|| {
                CardioError::DataError(format!("missing value for 'sex' in row {}", row))
            })?;
            Ok(HealthRecord {
                age: value(&age, schema::AGE, row)?,
                sex,
                cp: category_code(schema::CHEST_PAIN, value(&cp, schema::CHEST_PAIN, row)?)?,
                trestbps: value(&trestbps, schema::RESTING_BP, row)?,
                chol: value(&chol, schema::CHOLESTEROL, row)?,
                fbs: category_code(schema::FASTING_BS, value(&fbs, schema::FASTING_BS, row)?)?,
                restecg: category_code(
                    schema::RESTING_ECG,
                    value(&restecg, schema::RESTING_ECG, row)?,
                )?,
                thalach: value(&thalach, schema::MAX_HEART_RATE, row)?,
                exang: category_code(
                    schema::EXERCISE_ANGINA,
                    value(&exang, schema::EXERCISE_ANGINA, row)?,
                )?,
                oldpeak: value(&oldpeak, schema::ST_DEPRESSION, row)?,
                slope: category_code(schema::ST_SLOPE, value(&slope, schema::ST_SLOPE, row)?)?,
                ca: ca.as_ref().and_then(|c| c[row]),
                thal: thal.as_ref().and_then(|c| c[row]),
                target: value(&target, TARGET, row)?.round() as u8,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_frame() -> DataFrame {
        df!(
            "Age" => &[40i64, 49, 37, 48],
            "Sex" => &["M", "F", "M", "F"],
            "ChestPainType" => &["ATA", "NAP", "ATA", "ASY"],
            "RestingBP" => &[140i64, 160, 130, 138],
            "Cholesterol" => &[289i64, 180, 283, 214],
            "FastingBS" => &[0i64, 0, 0, 0],
            "RestingECG" => &["Normal", "Normal", "ST", "Normal"],
            "MaxHR" => &[172i64, 156, 98, 108],
            "ExerciseAngina" => &["N", "N", "N", "Y"],
            "Oldpeak" => &[0.0, 1.0, 0.0, 1.5],
            "ST_Slope" => &["Up", "Flat", "Up", "Flat"],
            "HeartDisease" => &[0i64, 1, 0, 1]
        )
        .unwrap()
    }

    #[test]
    fn test_detect_variant() {
        assert_eq!(SchemaVariant::detect(&labeled_frame()), SchemaVariant::Labeled);
        let canonical = df!("age" => &[1.0], "sex" => &[1.0]).unwrap();
        assert_eq!(SchemaVariant::detect(&canonical), SchemaVariant::Canonical);
    }

    #[test]
    fn test_labeled_variant_recoded() {
        let df = normalize_frame(&labeled_frame(), CodeConvention::ZeroBased).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names[0], "age");
        assert_eq!(names.last().unwrap(), "target");

        let cp: Vec<Option<f64>> = df.column("cp").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(cp, vec![Some(1.0), Some(2.0), Some(1.0), Some(3.0)]);

        let sex: Vec<Option<&str>> = df.column("sex").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(sex, vec![Some("Male"), Some("Female"), Some("Male"), Some("Female")]);

        let exang: Vec<Option<f64>> = df.column("exang").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(exang, vec![Some(0.0), Some(0.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_missing_values_filled_with_median() {
        let df = df!(
            "age" => &[Some(50.0), None, Some(60.0), Some(70.0)],
            "sex" => &[1.0, 0.0, 1.0, 1.0],
            "cp" => &[0.0, 1.0, 2.0, 3.0],
            "trestbps" => &[120.0, 130.0, 140.0, 150.0],
            "chol" => &[Some(200.0), Some(210.0), None, Some(230.0)],
            "fbs" => &[0.0, 0.0, 1.0, 0.0],
            "restecg" => &[0.0, 1.0, 0.0, 2.0],
            "thalach" => &[150.0, 160.0, 170.0, 140.0],
            "exang" => &[0.0, 1.0, 0.0, 1.0],
            "oldpeak" => &[1.0, 2.0, 0.5, 0.0],
            "slope" => &[0.0, 1.0, 2.0, 1.0],
            "target" => &[0.0, 1.0, 0.0, 1.0]
        )
        .unwrap();

        let normalized = normalize_frame(&df, CodeConvention::ZeroBased).unwrap();
        let age = normalized.column("age").unwrap().f64().unwrap();
        assert_eq!(age.get(1), Some(60.0));
        let chol = normalized.column("chol").unwrap().f64().unwrap();
        assert_eq!(chol.get(2), Some(210.0));
        assert_eq!(normalized.column("age").unwrap().null_count(), 0);
    }

    #[test]
    fn test_cleveland_codes_aligned() {
        let df = df!(
            "age" => &[63.0, 67.0],
            "sex" => &[1.0, 1.0],
            "cp" => &[1.0, 4.0],
            "trestbps" => &[145.0, 160.0],
            "chol" => &[233.0, 286.0],
            "fbs" => &[1.0, 0.0],
            "restecg" => &[2.0, 2.0],
            "thalach" => &[150.0, 108.0],
            "exang" => &[0.0, 1.0],
            "oldpeak" => &[2.3, 1.5],
            "slope" => &[3.0, 2.0],
            "ca" => &[0.0, 3.0],
            "thal" => &[6.0, 3.0],
            "target" => &[0.0, 2.0]
        )
        .unwrap();

        let normalized = normalize_frame(&df, CodeConvention::Cleveland).unwrap();
        let cp = normalized.column("cp").unwrap().f64().unwrap();
        assert_eq!(cp.get(0), Some(0.0));
        assert_eq!(cp.get(1), Some(3.0));
        let slope = normalized.column("slope").unwrap().f64().unwrap();
        assert_eq!(slope.get(0), Some(2.0));
        let target = normalized.column("target").unwrap().f64().unwrap();
        assert_eq!(target.get(1), Some(1.0));
    }

    #[test]
    fn test_missing_required_column() {
        let df = df!("age" => &[50.0], "target" => &[1.0]).unwrap();
        let err = normalize_frame(&df, CodeConvention::ZeroBased).unwrap_err();
        assert!(matches!(err, CardioError::DataError(_)));
    }

    #[test]
    fn test_records_from_frame() {
        let df = normalize_frame(&labeled_frame(), CodeConvention::ZeroBased).unwrap();
        let records = records_from_frame(&df).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].sex, Sex::Male);
        assert_eq!(records[3].cp, ChestPainType::Asymptomatic);
        assert_eq!(records[3].exang, Flag::Yes);
        assert_eq!(records[1].target, 1);
        assert!(records[0].ca.is_none());
    }
}
