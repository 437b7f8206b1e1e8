//! Dataset rows and the collections a dataset provider returns

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One test case's input fields, in their original order.
///
/// Rows are immutable once read; trials share them read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRow(Map<String, Value>);

impl DataRow {
    /// Create an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, replacing any previous value under `name`.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Get a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Get a string field by name.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume the row into a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for DataRow {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataRow {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A single stored test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Test case id.
    pub id: i64,
    /// Owning collection id.
    pub test_case_collection_id: i64,
    /// Input fields in column order.
    pub inputs: Map<String, Value>,
    /// Expected output, if any.
    #[serde(default)]
    pub target: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A named collection of test cases, as returned by a dataset provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseCollection {
    /// Collection id.
    pub id: i64,
    /// Collection name.
    pub name: String,
    /// Creation timestamp as reported by the provider.
    pub created_at: String,
    /// Last update timestamp as reported by the provider.
    pub last_updated_at: String,
    /// Column names of the inputs.
    pub column_names: Vec<String>,
    /// Test cases keyed by id.
    pub test_cases: BTreeMap<i64, TestCase>,
}

impl TestCaseCollection {
    /// Number of test cases in the collection.
    #[must_use]
    pub fn num_test_cases(&self) -> usize {
        self.test_cases.len()
    }

    /// One row per test case: its inputs followed by a `target` field.
    ///
    /// A missing target becomes the empty string so every row has the same
    /// shape.
    #[must_use]
    pub fn inputs_and_targets(&self) -> Vec<DataRow> {
        self.test_cases
            .values()
            .map(|case| {
                let mut fields = case.inputs.clone();
                fields.insert(
                    "target".to_string(),
                    Value::String(case.target.clone().unwrap_or_default()),
                );
                DataRow(fields)
            })
            .collect()
    }
}

/// Where an experiment gets its rows from.
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset<I> {
    /// Resolve a collection by name or id through the dataset provider.
    Collection(String),
    /// Use these rows directly.
    Rows(Vec<I>),
}

impl<I> Dataset<I> {
    /// Human-readable label used in logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Collection(name) => name.clone(),
            Self::Rows(rows) => format!("<{} inline rows>", rows.len()),
        }
    }
}

impl<I> From<Vec<I>> for Dataset<I> {
    fn from(rows: Vec<I>) -> Self {
        Self::Rows(rows)
    }
}

impl<I> From<&str> for Dataset<I> {
    fn from(name: &str) -> Self {
        Self::Collection(name.to_string())
    }
}

impl<I> From<String> for Dataset<I> {
    fn from(name: String) -> Self {
        Self::Collection(name)
    }
}
