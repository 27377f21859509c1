use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use serde::{Deserialize, Serialize};

/// Ingestion sequence number assigned by the writer.
///
/// Ids only grow, so sorting by `DocId` is sorting by index order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(pub u64);

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Numeric value indexed as a range-queryable point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Number {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl Number {
    pub fn value_type(&self) -> ValueType {
        match self {
            Number::Int(_) => ValueType::Integer,
            Number::Long(_) => ValueType::Long,
            Number::Float(_) => ValueType::Float,
            Number::Double(_) => ValueType::Double,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::Long(v) => v as f64,
            Number::Float(v) => v as f64,
            Number::Double(v) => v,
        }
    }

    /// Exact within one variant, by f64 value across variants.
    pub fn compare(&self, other: &Number) -> Ordering {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Long(a), Number::Long(b)) => a.cmp(&b),
            (Number::Int(a), Number::Long(b)) => (a as i64).cmp(&b),
            (Number::Long(a), Number::Int(b)) => a.cmp(&(b as i64)),
            (a, b) => a.as_f64().total_cmp(&b.as_f64()),
        }
    }

    /// The sort key this number produces when declared sortable.
    pub fn to_sort_key(&self) -> SortKey {
        match *self {
            Number::Int(v) => SortKey::Long(v as i64),
            Number::Long(v) => SortKey::Long(v),
            Number::Float(v) => SortKey::Double(v as f64),
            Number::Double(v) => SortKey::Double(v),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{}", v),
            Number::Long(v) => write!(f, "{}", v),
            Number::Float(v) => write!(f, "{}", v),
            Number::Double(v) => write!(f, "{}", v),
        }
    }
}

/// Closed numeric interval indexed by a range field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: Number,
    pub max: Number,
}

impl NumberRange {
    pub fn new(min: Number, max: Number) -> Self {
        NumberRange { min, max }
    }

    /// True when the two intervals share at least one value.
    pub fn intersects(&self, other: &NumberRange) -> bool {
        self.min.compare(&other.max) != Ordering::Greater && other.min.compare(&self.max) != Ordering::Greater
    }

    /// True when `other` lies entirely inside this interval.
    pub fn contains(&self, other: &NumberRange) -> bool {
        self.min.compare(&other.min) != Ordering::Greater && other.max.compare(&self.max) != Ordering::Greater
    }
}

impl fmt::Display for NumberRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} TO {}]", self.min, self.max)
    }
}

/// Per-document sort value (doc values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SortKey {
    Str(String),
    Long(i64),
    Double(f64),
}

impl SortKey {
    /// Total order; mixed numeric variants compare as f64, strings sort after numbers.
    pub fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Str(a), SortKey::Str(b)) => a.cmp(b),
            (SortKey::Long(a), SortKey::Long(b)) => a.cmp(b),
            (SortKey::Double(a), SortKey::Double(b)) => a.total_cmp(b),
            (SortKey::Long(a), SortKey::Double(b)) => (*a as f64).total_cmp(b),
            (SortKey::Double(a), SortKey::Long(b)) => a.total_cmp(&(*b as f64)),
            (SortKey::Str(_), _) => Ordering::Greater,
            (_, SortKey::Str(_)) => Ordering::Less,
        }
    }
}

/// Retrievable value, returned by stored-field fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Str(String),
    Bytes(Vec<u8>),
    Number(Number),
}

impl StoredValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StoredValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Indexed as a single untokenized term.
    Keyword(String),
    /// Indexed through the field's analyzer.
    Text(String),
    Point(Number),
    /// Numeric interval, queried by its relation to another interval.
    Range(NumberRange),
    Sorted(SortKey),
    /// Column value of a doc-values field: sortable, neither searchable nor stored.
    DocValue(SortKey),
    Stored(StoredValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Backend field-set for one document.
///
/// A field name may appear several times (repeated values, or the same
/// name used both as an indexed and a sorted field).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Record { fields: Vec::new() }
    }

    pub fn add(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
    }

    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.add(name, value);
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| &f.value)
    }

    /// First stored value under `name`.
    pub fn stored(&self, name: &str) -> Option<&StoredValue> {
        self.fields.iter().find_map(|f| match &f.value {
            FieldValue::Stored(s) if f.name == name => Some(s),
            _ => None,
        })
    }

    pub fn stored_str(&self, name: &str) -> Option<&str> {
        self.stored(name).and_then(StoredValue::as_str)
    }

    /// Keyword terms indexed under `name`, in insertion order.
    pub fn keywords<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values(name).filter_map(|v| match v {
            FieldValue::Keyword(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn sort_key(&self, name: &str) -> Option<&SortKey> {
        self.fields.iter().find_map(|f| match &f.value {
            FieldValue::Sorted(k) | FieldValue::DocValue(k) if f.name == name => Some(k),
            _ => None,
        })
    }

    /// Keeps only stored fields, restricted to `projection` unless it is empty.
    pub fn stored_only(&self, projection: &BTreeSet<String>) -> Record {
        let fields = self
            .fields
            .iter()
            .filter(|f| matches!(f.value, FieldValue::Stored(_)))
            .filter(|f| projection.is_empty() || projection.contains(&f.name))
            .cloned()
            .collect();
        Record { fields }
    }
}

/// Value type of an indexed field, as seen by queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    String,
    Integer,
    Long,
    Float,
    Double,
}

impl ValueType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ValueType::String)
    }
}

/// Sort comparator type of a sortable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortType {
    String,
    Int,
    Long,
    Float,
    Double,
}

impl From<ValueType> for SortType {
    fn from(value: ValueType) -> Self {
        match value {
            ValueType::String => SortType::String,
            ValueType::Integer => SortType::Int,
            ValueType::Long => SortType::Long,
            ValueType::Float => SortType::Float,
            ValueType::Double => SortType::Double,
        }
    }
}
