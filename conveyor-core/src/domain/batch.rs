//! Batch classification
//!
//! A [`BatchType`] decides, at submission time, how a request's elements become
//! work items: one claimable item per element (`INDIVIDUAL`) or a single item
//! holding every element (`BATCH`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::item::WorkItem;

/// Validation failures for batch classification and submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid processing method '{value}', expected one of: {expected}")]
    UnknownProcessingMethod { value: String, expected: String },

    #[error("invalid data source type '{value}', expected one of: {expected}")]
    UnknownDataSource { value: String, expected: String },

    #[error("batch type is missing field '{0}'")]
    MissingField(&'static str),

    #[error("a batch must contain at least one element")]
    EmptyBatch,

    #[error("element {0} exceeds the largest supported sequence number")]
    SequenceOverflow(usize),
}

/// How a request's elements are grouped into work items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingMethod {
    Individual,
    Batch,
}

impl ProcessingMethod {
    pub const ALL: [ProcessingMethod; 2] = [ProcessingMethod::Individual, ProcessingMethod::Batch];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMethod::Individual => "INDIVIDUAL",
            ProcessingMethod::Batch => "BATCH",
        }
    }
}

/// Logical family the elements come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceType {
    Users,
    Categories,
}

impl DataSourceType {
    pub const ALL: [DataSourceType; 2] = [DataSourceType::Users, DataSourceType::Categories];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceType::Users => "USERS",
            DataSourceType::Categories => "CATEGORIES",
        }
    }
}

fn vocabulary<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    values.into_iter().collect::<Vec<_>>().join(", ")
}

impl std::str::FromStr for ProcessingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownProcessingMethod {
                value: s.to_string(),
                expected: vocabulary(Self::ALL.iter().map(|m| m.as_str())),
            })
    }
}

impl std::str::FromStr for DataSourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ValidationError::UnknownDataSource {
                value: s.to_string(),
                expected: vocabulary(Self::ALL.iter().map(|d| d.as_str())),
            })
    }
}

impl std::fmt::Display for ProcessingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing method x data source classification of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchType {
    pub processing_method: ProcessingMethod,
    pub data_source_type: DataSourceType,
}

impl BatchType {
    pub const INDIVIDUAL_USERS: BatchType =
        BatchType::from_components(ProcessingMethod::Individual, DataSourceType::Users);
    pub const INDIVIDUAL_CATEGORIES: BatchType =
        BatchType::from_components(ProcessingMethod::Individual, DataSourceType::Categories);
    pub const BATCH_USERS: BatchType =
        BatchType::from_components(ProcessingMethod::Batch, DataSourceType::Users);
    pub const BATCH_CATEGORIES: BatchType =
        BatchType::from_components(ProcessingMethod::Batch, DataSourceType::Categories);

    pub const fn from_components(
        processing_method: ProcessingMethod,
        data_source_type: DataSourceType,
    ) -> Self {
        Self {
            processing_method,
            data_source_type,
        }
    }

    /// Classifies a request from its (case-insensitive) method and source names
    pub fn parse(processing_method: &str, data_source_type: &str) -> Result<Self, ValidationError> {
        Ok(Self::from_components(
            processing_method.parse()?,
            data_source_type.parse()?,
        ))
    }

    pub fn to_dict(&self) -> Map<String, JsonValue> {
        let mut map = Map::new();
        map.insert(
            "processing_method".to_string(),
            JsonValue::String(self.processing_method.as_str().to_string()),
        );
        map.insert(
            "data_source_type".to_string(),
            JsonValue::String(self.data_source_type.as_str().to_string()),
        );
        map
    }

    pub fn from_dict(map: &Map<String, JsonValue>) -> Result<Self, ValidationError> {
        let method = map
            .get("processing_method")
            .and_then(JsonValue::as_str)
            .ok_or(ValidationError::MissingField("processing_method"))?;
        let source = map
            .get("data_source_type")
            .and_then(JsonValue::as_str)
            .ok_or(ValidationError::MissingField("data_source_type"))?;
        Self::parse(method, source)
    }

    pub fn is_individual(&self) -> bool {
        self.processing_method == ProcessingMethod::Individual
    }
}

impl std::fmt::Display for BatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.processing_method, self.data_source_type)
    }
}

/// A submitted batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub batch_type: BatchType,
    pub template_ref: Uuid,
    pub capability: String,
    /// Number of submitted elements, not work items
    pub element_count: i32,
    /// Batch this one resubmits retriable elements of
    pub retry_of: Option<Uuid>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Builds the initial pending work items for a submitted batch
///
/// `INDIVIDUAL` yields one item per element so different workers can claim them
/// in parallel; `BATCH` yields a single item whose payload is the whole array.
/// Sequence number stored for the element at `index`
pub fn sequence_for(index: usize) -> Result<i32, ValidationError> {
    i32::try_from(index).map_err(|_| ValidationError::SequenceOverflow(index))
}

pub fn build_work_items(
    batch_id: Uuid,
    batch_type: BatchType,
    template_ref: Uuid,
    capability: &str,
    elements: Vec<JsonValue>,
) -> Result<Vec<WorkItem>, ValidationError> {
    if elements.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }

    let items = match batch_type.processing_method {
        ProcessingMethod::Individual => elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                Ok(WorkItem::pending(
                    batch_id,
                    sequence_for(index)?,
                    batch_type,
                    template_ref,
                    capability,
                    element,
                ))
            })
            .collect::<Result<_, _>>()?,
        ProcessingMethod::Batch => vec![WorkItem::pending(
            batch_id,
            0,
            batch_type,
            template_ref,
            capability,
            JsonValue::Array(elements),
        )],
    };

    Ok(items)
}
