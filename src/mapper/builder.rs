use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;
use std::sync::Arc;
use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;
use crate::analysis::analyzer::KEYWORD;
use crate::core::config::Config;
use crate::core::error::{IndexError, Result};
use crate::core::types::{FieldValue, NumberRange, Record, SortKey, SortType, ValueType};
use crate::mapper::codec::PayloadCodec;
use crate::mapper::document_mapper::{ID_FIELD, SOURCE_FIELD};
use crate::mapper::entity_mapper::{EntityMapper, FieldDecl, FieldRole};
use crate::mapper::field::{FieldTypes, IndexedFieldType};
use crate::mapper::value::{IndexRange, IndexValue, Scalar};

pub(crate) type Emitter<T> = Arc<dyn Fn(&T, &mut Record) + Send + Sync>;
pub(crate) type IdAccessor<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Defaults applied while declaring fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapperSettings {
    /// What `Auto` resolves to for string values.
    pub default_string_type: IndexedFieldType,
    /// Offset used to read local date-times.
    pub zone_offset: FixedOffset,
}

impl Default for MapperSettings {
    fn default() -> Self {
        MapperSettings {
            default_string_type: IndexedFieldType::Text,
            zone_offset: Utc.fix(),
        }
    }
}

impl MapperSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let zone_offset = FixedOffset::east_opt(config.zone_offset_seconds).ok_or_else(|| {
            IndexError::configuration(format!(
                "zone offset of {} seconds is out of range",
                config.zone_offset_seconds
            ))
        })?;
        Ok(MapperSettings {
            default_string_type: config.default_string_type,
            zone_offset,
        })
    }
}

/// Schema builder for [`EntityMapper`].
///
/// Declarations never fail on the spot: problems are collected and the first
/// one is returned by `build`, so a mapper either builds completely or not at
/// all.
///
/// ```ignore
/// let mapper = EntityMapper::<Product>::builder()
///     .id(|p| p.id)
///     .field("name", IndexedFieldType::Text, |p| p.name.clone())
///     .field("size", IndexedFieldType::Point, |p| p.size)
///     .sorted_field("size", |p| p.size)
///     .repeated_field("tags", IndexedFieldType::Keyword, |p| p.tags.clone())
///     .range_field("sizes", |p| IndexRange::new(p.min_size, p.max_size))
///     .nested("supplier", false, |p| p.supplier.as_ref(), |b| {
///         b.field("name", IndexedFieldType::Auto, |s: &Supplier| s.name.clone())
///     })
///     .build()?;
/// ```
pub struct MapperBuilder<T> {
    settings: MapperSettings,
    prefix: Option<String>,
    nested: bool,
    fields: Vec<FieldDecl<T>>,
    id: Option<IdAccessor<T>>,
    declared_analyzers: Vec<(String, String)>,
    preset_analyzers: BTreeMap<String, String>,
    codec: Option<Arc<dyn PayloadCodec<T>>>,
    errors: Vec<IndexError>,
}

impl<T: 'static> MapperBuilder<T> {
    pub fn new(settings: MapperSettings) -> Self {
        Self::scoped(settings, None, false)
    }

    fn scoped(settings: MapperSettings, prefix: Option<String>, nested: bool) -> Self {
        MapperBuilder {
            settings,
            prefix,
            nested,
            fields: Vec::new(),
            id: None,
            declared_analyzers: Vec::new(),
            preset_analyzers: BTreeMap::new(),
            codec: None,
            errors: Vec::new(),
        }
    }

    pub fn codec(mut self, codec: impl PayloadCodec<T> + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Declares the identifier, stringified with `Display`. Only the first
    /// declaration counts.
    pub fn id<V, F>(mut self, accessor: F) -> Self
    where
        V: Display,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        if self.nested {
            warn!(prefix = ?self.prefix, "identifier declared on a nested type is ignored");
            return self;
        }
        if self.id.is_some() {
            warn!("identifier declared more than once, keeping the first declaration");
            return self;
        }
        self.id = Some(Arc::new(move |element: &T| accessor(element).to_string()));
        self
    }

    pub fn field<V, F>(self, name: &str, field_type: IndexedFieldType, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.declare_indexed(name, field_type, move |element, sink: &mut dyn FnMut(V)| {
            sink(accessor(element))
        })
    }

    /// A field emitted only when the accessor returns a value.
    pub fn optional_field<V, F>(self, name: &str, field_type: IndexedFieldType, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        F: Fn(&T) -> Option<V> + Send + Sync + 'static,
    {
        self.declare_indexed(name, field_type, move |element, sink: &mut dyn FnMut(V)| {
            if let Some(value) = accessor(element) {
                sink(value)
            }
        })
    }

    /// One field value per element; order is irrelevant.
    pub fn repeated_field<V, I, F>(self, name: &str, field_type: IndexedFieldType, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        I: IntoIterator<Item = V>,
        F: Fn(&T) -> I + Send + Sync + 'static,
    {
        self.declare_indexed(name, field_type, move |element, sink: &mut dyn FnMut(V)| {
            for value in accessor(element) {
                sink(value)
            }
        })
    }

    /// A numeric interval, queried with `with_range_relation`.
    ///
    /// An interval whose minimum is above its maximum is not indexed.
    pub fn range_field<V, F>(mut self, name: &str, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        F: Fn(&T) -> IndexRange<V> + Send + Sync + 'static,
    {
        let name = self.qualify(name);
        let value_type = V::value_type();
        if !value_type.is_numeric() {
            self.errors.push(IndexError::unsupported_field_type(
                &name,
                format!("{:?} value can not be indexed as a range", value_type),
            ));
            return self;
        }

        let zone = self.settings.zone_offset;
        let field_name = name.clone();
        let emit: Emitter<T> = Arc::new(move |element: &T, record: &mut Record| {
            let range = accessor(element);
            let (Scalar::Number(min), Scalar::Number(max)) = (range.min.to_scalar(&zone), range.max.to_scalar(&zone))
            else {
                return;
            };
            let range = NumberRange::new(min, max);
            if range.min.compare(&range.max).is_gt() {
                warn!(field = %field_name, %range, "inverted range is not indexed");
                return;
            }
            record.add(field_name.clone(), FieldValue::Range(range));
        });

        self.fields.push(FieldDecl {
            name,
            role: FieldRole::Indexed,
            value_type,
            sortable: false,
            emit,
        });
        self
    }

    pub fn sorted_field<V, F>(self, name: &str, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.declare_sorted(name, move |element, sink: &mut dyn FnMut(V)| sink(accessor(element)))
    }

    pub fn optional_sorted_field<V, F>(self, name: &str, accessor: F) -> Self
    where
        V: IndexValue + 'static,
        F: Fn(&T) -> Option<V> + Send + Sync + 'static,
    {
        self.declare_sorted(name, move |element, sink: &mut dyn FnMut(V)| {
            if let Some(value) = accessor(element) {
                sink(value)
            }
        })
    }

    /// Uses the named analyzer for `field`, both when indexing and when
    /// parsing query text.
    pub fn analyzer(mut self, field: &str, analyzer: &str) -> Self {
        let name = self.qualify(field);
        self.declared_analyzers.push((name, analyzer.to_string()));
        self
    }

    /// Analyzers that take precedence over any declaration.
    pub fn with_analyzers(mut self, analyzers: BTreeMap<String, String>) -> Self {
        self.preset_analyzers.extend(analyzers);
        self
    }

    /// Declares the fields of a nested value.
    ///
    /// Nested names are prefixed with `name` and a dot unless `flatten` is
    /// set. When the accessor returns `None` no nested field is emitted.
    pub fn nested<N, A, C>(mut self, name: &str, flatten: bool, accessor: A, configure: C) -> Self
    where
        N: 'static,
        A: Fn(&T) -> Option<&N> + Send + Sync + 'static,
        C: FnOnce(MapperBuilder<N>) -> MapperBuilder<N>,
    {
        let prefix = if flatten {
            self.prefix.clone()
        } else {
            Some(self.qualify(name))
        };
        let child = configure(MapperBuilder::scoped(self.settings, prefix, true));

        let accessor = Arc::new(accessor);
        for field in child.fields {
            let accessor = Arc::clone(&accessor);
            let emit = field.emit;
            self.fields.push(FieldDecl {
                name: field.name,
                role: field.role,
                value_type: field.value_type,
                sortable: field.sortable,
                emit: Arc::new(move |element: &T, record: &mut Record| {
                    if let Some(nested) = accessor(element) {
                        emit(nested, record);
                    }
                }),
            });
        }
        self.declared_analyzers.extend(child.declared_analyzers);
        self.preset_analyzers.extend(child.preset_analyzers);
        self.errors.extend(child.errors);
        self
    }

    pub fn build(self) -> Result<EntityMapper<T>> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name == ID_FIELD || field.name == SOURCE_FIELD {
                return Err(IndexError::configuration(format!(
                    "field name '{}' is reserved",
                    field.name
                )));
            }
            if !seen.insert((field.role, field.name.as_str())) {
                return Err(IndexError::configuration(format!(
                    "{} field '{}' is declared more than once",
                    field.role, field.name
                )));
            }
        }

        let mut analyzers: BTreeMap<String, String> = BTreeMap::new();
        for (field, analyzer) in self.declared_analyzers {
            if self.preset_analyzers.contains_key(&field) {
                continue;
            }
            match analyzers.get(&field) {
                Some(existing) if *existing != analyzer => {
                    return Err(IndexError::configuration(format!(
                        "conflicting analyzers '{}' and '{}' for field '{}'",
                        existing, analyzer, field
                    )));
                }
                Some(_) => {}
                None => {
                    analyzers.insert(field, analyzer);
                }
            }
        }
        analyzers.extend(self.preset_analyzers);

        let mut field_types = FieldTypes::new();
        if self.id.is_some() {
            field_types.insert_indexed(ID_FIELD, ValueType::String);
        }
        for field in &self.fields {
            match field.role {
                FieldRole::Indexed => field_types.insert_indexed(field.name.clone(), field.value_type),
                FieldRole::Sorted => field_types.insert_sorted(field.name.clone(), SortType::from(field.value_type)),
            }
            if field.sortable && field.role == FieldRole::Indexed {
                field_types.insert_sorted(field.name.clone(), SortType::from(field.value_type));
            }
        }

        let codec = self
            .codec
            .ok_or_else(|| IndexError::configuration("no payload codec configured"))?;

        Ok(EntityMapper::new(self.fields, self.id, field_types, analyzers, codec))
    }

    fn qualify(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        }
    }

    fn declare_indexed<V, E>(mut self, name: &str, field_type: IndexedFieldType, extract: E) -> Self
    where
        V: IndexValue + 'static,
        E: Fn(&T, &mut dyn FnMut(V)) + Send + Sync + 'static,
    {
        let name = self.qualify(name);
        let value_type = V::value_type();
        let kind = match resolve_kind(&name, field_type, value_type, self.settings.default_string_type) {
            Ok(kind) => kind,
            Err(error) => {
                self.errors.push(error);
                return self;
            }
        };
        if kind == IndexedFieldType::Keyword {
            self.declared_analyzers.push((name.clone(), KEYWORD.to_string()));
        }

        let zone = self.settings.zone_offset;
        let field_name = name.clone();
        let emit: Emitter<T> = Arc::new(move |element: &T, record: &mut Record| {
            extract(element, &mut |value: V| {
                record.add(field_name.clone(), indexed_value(kind, value.to_scalar(&zone)));
            });
        });

        self.fields.push(FieldDecl {
            name,
            role: FieldRole::Indexed,
            value_type: indexed_value_type(kind, value_type),
            sortable: kind == IndexedFieldType::DocValues,
            emit,
        });
        self
    }

    fn declare_sorted<V, E>(mut self, name: &str, extract: E) -> Self
    where
        V: IndexValue + 'static,
        E: Fn(&T, &mut dyn FnMut(V)) + Send + Sync + 'static,
    {
        let name = self.qualify(name);
        let zone = self.settings.zone_offset;
        let field_name = name.clone();
        let emit: Emitter<T> = Arc::new(move |element: &T, record: &mut Record| {
            extract(element, &mut |value: V| {
                let key = match value.to_scalar(&zone) {
                    Scalar::Str(s) => SortKey::Str(s),
                    Scalar::Number(n) => n.to_sort_key(),
                };
                record.add(field_name.clone(), FieldValue::Sorted(key));
            });
        });

        self.fields.push(FieldDecl {
            name,
            role: FieldRole::Sorted,
            value_type: V::value_type(),
            sortable: true,
            emit,
        });
        self
    }
}

fn resolve_kind(
    name: &str,
    declared: IndexedFieldType,
    value_type: ValueType,
    default_string_type: IndexedFieldType,
) -> Result<IndexedFieldType> {
    match declared {
        IndexedFieldType::Auto if value_type.is_numeric() => Ok(IndexedFieldType::Point),
        IndexedFieldType::Auto if default_string_type.is_string_type() => Ok(default_string_type),
        IndexedFieldType::Auto => Err(IndexError::configuration(format!(
            "default string type {:?} can not index strings",
            default_string_type
        ))),
        IndexedFieldType::Point if !value_type.is_numeric() => Err(IndexError::unsupported_field_type(
            name,
            format!("{:?} value can not be indexed as a point", value_type),
        )),
        kind if kind.is_string_type() && value_type.is_numeric() => Err(IndexError::unsupported_field_type(
            name,
            format!("{:?} value can not be indexed as {:?}", value_type, kind),
        )),
        kind => Ok(kind),
    }
}

fn indexed_value_type(kind: IndexedFieldType, value_type: ValueType) -> ValueType {
    match (kind, value_type) {
        (IndexedFieldType::DocValues, ValueType::Integer) => ValueType::Long,
        (IndexedFieldType::Point | IndexedFieldType::DocValues, value_type) => value_type,
        _ => ValueType::String,
    }
}

fn indexed_value(kind: IndexedFieldType, scalar: Scalar) -> FieldValue {
    match (kind, scalar) {
        (IndexedFieldType::Point, Scalar::Number(n)) => FieldValue::Point(n),
        (IndexedFieldType::DocValues, Scalar::Number(n)) => FieldValue::DocValue(n.to_sort_key()),
        (IndexedFieldType::DocValues, Scalar::Str(s)) => FieldValue::DocValue(SortKey::Str(s)),
        (IndexedFieldType::Text, scalar) => FieldValue::Text(scalar.into_string()),
        (_, scalar) => FieldValue::Keyword(scalar.into_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Number;
    use crate::mapper::codec::JsonCodec;
    use crate::mapper::document_mapper::DocumentMapper;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Nested {
        text: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Entity {
        id: u32,
        size: i32,
        nested_bean: Option<Nested>,
    }

    fn entity() -> Entity {
        Entity {
            id: 7,
            size: 42,
            nested_bean: Some(Nested { text: "Hello".into() }),
        }
    }

    fn builder() -> MapperBuilder<Entity> {
        MapperBuilder::new(MapperSettings::default()).codec(JsonCodec)
    }

    #[test]
    fn test_nested_prefix_and_flatten() {
        let nested = builder()
            .nested("nestedBean1", false, |e: &Entity| e.nested_bean.as_ref(), |b| {
                b.field("text", IndexedFieldType::Auto, |n: &Nested| n.text.clone())
            })
            .build()
            .unwrap();
        let record = nested.to_record(&entity()).unwrap();
        assert!(record.values("nestedBean1.text").any(|v| *v == FieldValue::Text("Hello".into())));

        let flat = builder()
            .nested("nestedBean1", true, |e: &Entity| e.nested_bean.as_ref(), |b| {
                b.field("text", IndexedFieldType::Auto, |n: &Nested| n.text.clone())
            })
            .build()
            .unwrap();
        let record = flat.to_record(&entity()).unwrap();
        assert_eq!(record.values("text").count(), 1);
        assert_eq!(record.values("nestedBean1.text").count(), 0);

        let mut empty = entity();
        empty.nested_bean = None;
        assert_eq!(flat.to_record(&empty).unwrap().values("text").count(), 0);
    }

    #[test]
    fn test_flattened_collision_is_rejected() {
        let err = builder()
            .field("text", IndexedFieldType::Text, |e: &Entity| e.size.to_string())
            .nested("nestedBean1", true, |e: &Entity| e.nested_bean.as_ref(), |b| {
                b.field("text", IndexedFieldType::Auto, |n: &Nested| n.text.clone())
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration { .. }));
    }

    #[test]
    fn test_type_mismatches() {
        let err = builder()
            .field("size", IndexedFieldType::Point, |e: &Entity| e.size.to_string())
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFieldType { field, .. } if field == "size"));

        let err = builder()
            .field("size", IndexedFieldType::Keyword, |e: &Entity| e.size)
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFieldType { .. }));
    }

    #[test]
    fn test_analyzer_conflicts() {
        let err = builder()
            .field("code", IndexedFieldType::Keyword, |e: &Entity| e.id.to_string())
            .analyzer("code", "english")
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::Configuration { .. }));

        let mut preset = BTreeMap::new();
        preset.insert("code".to_string(), "whitespace".to_string());
        let mapper = builder()
            .field("code", IndexedFieldType::Keyword, |e: &Entity| e.id.to_string())
            .analyzer("code", "english")
            .with_analyzers(preset)
            .build()
            .unwrap();
        assert_eq!(mapper.analyzers()["code"], "whitespace");
    }

    #[test]
    fn test_second_id_is_ignored() {
        let mapper = builder()
            .id(|e: &Entity| e.id)
            .id(|e: &Entity| e.size)
            .build()
            .unwrap();
        assert_eq!(mapper.element_id(&entity()).unwrap(), "7");
    }

    #[test]
    fn test_doc_values_and_string_types() {
        let mapper = builder()
            .field("size", IndexedFieldType::DocValues, |e: &Entity| e.size)
            .field("label", IndexedFieldType::String, |_: &Entity| "Big Box")
            .build()
            .unwrap();
        let record = mapper.to_record(&entity()).unwrap();
        assert_eq!(record.stored("size"), None);
        assert!(record.stored_only(&Default::default()).stored("size").is_none());
        assert_eq!(record.sort_key("size"), Some(&SortKey::Long(42)));
        assert_eq!(record.keywords("label").collect::<Vec<_>>(), vec!["Big Box"]);
        assert_eq!(mapper.field_type("size").unwrap(), ValueType::Long);
        assert_eq!(mapper.sort_type("size"), Some(SortType::Long));
        assert!(!mapper.analyzers().contains_key("label"));
    }

    #[test]
    fn test_range_fields() {
        let mapper = builder()
            .range_field("span", |e: &Entity| IndexRange::new(e.size - 2, e.size + 2))
            .range_field("inverted", |e: &Entity| IndexRange::new(e.size, 0))
            .build()
            .unwrap();
        let record = mapper.to_record(&entity()).unwrap();
        let spans: Vec<_> = record.values("span").collect();
        assert_eq!(
            spans,
            vec![&FieldValue::Range(NumberRange::new(Number::Int(40), Number::Int(44)))]
        );
        assert_eq!(record.values("inverted").count(), 0);
        assert_eq!(mapper.field_type("span").unwrap(), ValueType::Integer);

        let err = builder()
            .range_field("labels", |_: &Entity| IndexRange::new("a", "b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFieldType { field, .. } if field == "labels"));
    }
}
