use crate::error::{Result, ResultWithContext, VegaQueryError};
use ahash::RandomState;
use arrow::{
    compute::concat_batches,
    datatypes::{Schema, SchemaRef},
    json,
    json::writer::JsonArray,
    record_batch::RecordBatch,
};
use serde_json::Value;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

#[cfg(feature = "prettyprint")]
use arrow::util::pretty::pretty_format_batches;

/// Arrow record batches sharing a schema, the in-memory form of query results
#[derive(Clone, Debug)]
pub struct VegaQueryTable {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl VegaQueryTable {
    pub fn try_new(schema: SchemaRef, partitions: Vec<RecordBatch>) -> Result<Self> {
        // Make all columns nullable
        let nullable = |schema: &Schema| -> Schema {
            Schema::new(
                schema
                    .fields
                    .iter()
                    .map(|f| f.as_ref().clone().with_nullable(true))
                    .collect::<Vec<_>>(),
            )
        };
        let schema = Arc::new(nullable(&schema));
        if partitions
            .iter()
            .all(|batch| schema.fields.contains(&nullable(&batch.schema()).fields))
        {
            Ok(Self {
                schema,
                batches: partitions,
            })
        } else {
            Err(VegaQueryError::internal(
                "Mismatch between schema and batches",
            ))
        }
    }

    pub fn empty() -> Self {
        Self {
            schema: Arc::new(Schema::empty()),
            batches: vec![],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|batch| batch.num_rows()).sum()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema
            .fields
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Keep, at most, the first n rows
    pub fn head(&self, n: usize) -> Self {
        let mut so_far = 0;
        let mut head_batches: Vec<RecordBatch> = Vec::new();

        for batch in &self.batches {
            if so_far == n {
                break;
            } else if so_far + batch.num_rows() <= n {
                so_far += batch.num_rows();
                head_batches.push(batch.clone());
            } else {
                head_batches.push(batch.slice(0, n - so_far));
                break;
            }
        }

        Self {
            schema: self.schema.clone(),
            batches: head_batches,
        }
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = self
            .batches
            .first()
            .map(|batch| batch.schema())
            .unwrap_or_else(|| self.schema.clone());
        concat_batches(&schema, &self.batches)
            .with_context(|| String::from("Failed to concatenate RecordBatches"))
    }

    /// Row oriented JSON: an array with one object per row, nulls written explicitly
    pub fn to_json(&self) -> Result<Value> {
        if self.num_rows() == 0 {
            return Ok(Value::Array(vec![]));
        }
        let mut writer = json::WriterBuilder::new()
            .with_explicit_nulls(true)
            .build::<_, JsonArray>(Vec::new());
        let batches: Vec<&RecordBatch> = self.batches.iter().collect();
        writer
            .write_batches(&batches)
            .with_context(|| "Failed to write record batches as JSON")?;
        writer.finish()?;
        let buffer = writer.into_inner();
        Ok(serde_json::from_slice(&buffer)?)
    }

    pub fn to_json_rows(&self) -> Result<Vec<Value>> {
        match self.to_json()? {
            Value::Array(rows) => Ok(rows),
            other => Err(VegaQueryError::internal(format!(
                "Expected JSON array of rows, found {other}"
            ))),
        }
    }

    /// Build a table from an array of row objects
    pub fn from_json(value: &Value) -> Result<Self> {
        let Value::Array(values) = value else {
            return Err(VegaQueryError::internal(format!(
                "Expected JSON array, not: {value}"
            )));
        };
        if let Some(first) = values.iter().find(|v| !v.is_object()) {
            return Err(VegaQueryError::internal(format!(
                "Expected every row to be a JSON object, found: {first}"
            )));
        }

        let schema = json::reader::infer_json_schema_from_iterator(
            values.iter().take(1024).map(|v| Ok(v.clone())),
        )
        .with_context(|| "Failed to infer schema from JSON rows")?;
        if schema.fields.is_empty() {
            return Ok(Self::empty());
        }

        let schema_ref = Arc::new(schema);
        let mut decoder = json::ReaderBuilder::new(schema_ref.clone())
            .with_coerce_primitive(true)
            .build_decoder()?;
        decoder.serialize(values.as_slice())?;

        let mut batches: Vec<RecordBatch> = Vec::new();
        while let Some(batch) = decoder
            .flush()
            .with_context(|| "Failed to read json to arrow")?
        {
            batches.push(batch);
        }

        Self::try_new(schema_ref, batches)
    }

    #[cfg(feature = "prettyprint")]
    pub fn pretty_format(&self, max_rows: Option<usize>) -> Result<String> {
        let table = match max_rows {
            Some(max_rows) => self.head(max_rows),
            None => self.clone(),
        };
        pretty_format_batches(&table.batches)
            .with_context(|| String::from("Failed to pretty print"))
            .map(|s| s.to_string())
    }

    /// Fixed-seed fingerprint of the schema and contents
    pub fn get_hash(&self) -> Result<u64> {
        let hasher = RandomState::with_seed(123);
        let mut state = hasher.build_hasher();
        self.schema.hash(&mut state);
        self.to_json()?.to_string().hash(&mut state);
        Ok(state.finish())
    }
}

impl From<RecordBatch> for VegaQueryTable {
    fn from(value: RecordBatch) -> Self {
        Self {
            schema: value.schema(),
            batches: vec![value],
        }
    }
}
