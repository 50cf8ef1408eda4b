//! Model metadata.
//!
//! [`ModelMetadata`] describes a bindable type or property: its kind, its
//! child properties, the data annotations that drive validation and the flags
//! the binder consults. Metadata is assembled with [`ModelMetadataBuilder`];
//! [`MetadataAware`] hooks may adjust it while it is being created, after
//! which it is frozen behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use composable_mvc_core::metadata::{AllowHtml, ModelMetadata};
//! use composable_mvc_core::validation::DataAnnotation;
//!
//! let person = ModelMetadata::complex("Person")
//!     .property(ModelMetadata::string("Name").annotate(DataAnnotation::required()))
//!     .property(ModelMetadata::string("Bio").aware(AllowHtml))
//!     .property(ModelMetadata::integer("Age"))
//!     .build();
//!
//! assert_eq!(person.properties().len(), 3);
//! assert!(!person.property("bio").map_or(true, |p| p.request_validation_enabled()));
//! ```

use crate::validation::DataAnnotation;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// The shape of a bindable model.
#[derive(Debug, Clone)]
pub enum ModelKind {
    /// Text
    String,
    /// Whole number
    Integer,
    /// Floating point number
    Float,
    /// `true` / `false`
    Boolean,
    /// Uploaded file
    File,
    /// Raw value passed through unchanged
    Any,
    /// Object with named properties
    Complex,
    /// Sequence of elements described by the inner metadata
    Collection(Arc<ModelMetadata>),
}

impl ModelKind {
    /// Whether the kind is bound from a single value.
    #[must_use]
    pub const fn is_simple(&self) -> bool {
        !matches!(self, Self::Complex | Self::Collection(_))
    }

    /// Whether the kind corresponds to a value type with a zero default.
    #[must_use]
    pub const fn is_value_type(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Boolean)
    }

    /// Whether the kind is numeric.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// Hook that may adjust metadata while it is being created.
pub trait MetadataAware: Send + Sync {
    /// Adjust `metadata` in place.
    fn on_metadata_created(&self, metadata: &mut ModelMetadata);
}

/// Marks a property as accepting raw markup, exempting it from request validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowHtml;

impl MetadataAware for AllowHtml {
    fn on_metadata_created(&self, metadata: &mut ModelMetadata) {
        metadata.request_validation_enabled = false;
    }
}

/// Model-supplied error information, consulted after binding.
pub trait DataErrorInfo: Send + Sync {
    /// An error describing the whole model, if any.
    fn error(&self, model: &Value) -> Option<String> {
        let _ = model;
        None
    }

    /// An error describing one property of the model, if any.
    fn property_error(&self, model: &Value, property: &str) -> Option<String> {
        let _ = (model, property);
        None
    }
}

/// Description of a bindable type or property.
pub struct ModelMetadata {
    name: String,
    kind: ModelKind,
    is_nullable: bool,
    display_name: Option<String>,
    properties: Vec<Arc<ModelMetadata>>,
    annotations: Vec<DataAnnotation>,
    request_validation_enabled: bool,
    convert_empty_string_to_null: bool,
    error_info: Option<Arc<dyn DataErrorInfo>>,
    additional_values: IndexMap<String, Value>,
}

impl fmt::Debug for ModelMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelMetadata")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("is_nullable", &self.is_nullable)
            .field("properties", &self.properties.len())
            .field("annotations", &self.annotations)
            .field("request_validation_enabled", &self.request_validation_enabled)
            .finish_non_exhaustive()
    }
}

impl ModelMetadata {
    /// Start building metadata of the given kind.
    #[must_use]
    pub fn builder(name: impl Into<String>, kind: ModelKind) -> ModelMetadataBuilder {
        ModelMetadataBuilder::new(name.into(), kind)
    }

    /// Text model.
    #[must_use]
    pub fn string(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::String)
    }

    /// Whole-number model (non-nullable unless marked otherwise).
    #[must_use]
    pub fn integer(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Integer)
    }

    /// Floating point model (non-nullable unless marked otherwise).
    #[must_use]
    pub fn float(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Float)
    }

    /// Boolean model (non-nullable unless marked otherwise).
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Boolean)
    }

    /// Uploaded-file model.
    #[must_use]
    pub fn file(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::File)
    }

    /// Pass-through model.
    #[must_use]
    pub fn any(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Any)
    }

    /// Object model; add properties with [`ModelMetadataBuilder::property`].
    #[must_use]
    pub fn complex(name: impl Into<String>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Complex)
    }

    /// Sequence model whose elements are described by `element`.
    #[must_use]
    pub fn collection(name: impl Into<String>, element: Arc<Self>) -> ModelMetadataBuilder {
        Self::builder(name, ModelKind::Collection(element))
    }

    /// Property or type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind of model.
    #[must_use]
    pub const fn kind(&self) -> &ModelKind {
        &self.kind
    }

    /// Whether a missing value is acceptable.
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    /// Name used in messages: the display name, falling back to the model name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }

    /// Child property metadata (complex kinds only).
    #[must_use]
    pub fn properties(&self) -> &[Arc<Self>] {
        &self.properties
    }

    /// Look up a child property case-insensitively.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Arc<Self>> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Declared data annotations.
    #[must_use]
    pub fn annotations(&self) -> &[DataAnnotation] {
        &self.annotations
    }

    /// Whether request values bound to this model are checked for markup.
    #[must_use]
    pub const fn request_validation_enabled(&self) -> bool {
        self.request_validation_enabled
    }

    /// Whether an empty string binds as `null`.
    #[must_use]
    pub const fn convert_empty_string_to_null(&self) -> bool {
        self.convert_empty_string_to_null
    }

    /// Model-supplied error information hook.
    #[must_use]
    pub fn error_info(&self) -> Option<&Arc<dyn DataErrorInfo>> {
        self.error_info.as_ref()
    }

    /// Free-form values attached by metadata hooks.
    #[must_use]
    pub const fn additional_values(&self) -> &IndexMap<String, Value> {
        &self.additional_values
    }

    /// Whether the model must have a value: explicitly required, or a
    /// non-nullable value kind.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.annotations
            .iter()
            .any(|a| matches!(a, DataAnnotation::Required { .. }))
            || (self.kind.is_value_type() && !self.is_nullable)
    }

    /// The value an absent model takes: zero for non-nullable value kinds,
    /// `null` otherwise.
    #[must_use]
    pub fn default_value(&self) -> Value {
        if self.is_nullable {
            return Value::Null;
        }
        match self.kind {
            ModelKind::Integer => Value::from(0),
            ModelKind::Float => Value::from(0.0),
            ModelKind::Boolean => Value::Bool(false),
            _ => Value::Null,
        }
    }

    /// Set the display name. Intended for [`MetadataAware`] hooks.
    pub fn set_display_name(&mut self, display_name: impl Into<String>) {
        self.display_name = Some(display_name.into());
    }

    /// Enable or disable request validation. Intended for [`MetadataAware`] hooks.
    pub const fn set_request_validation_enabled(&mut self, enabled: bool) {
        self.request_validation_enabled = enabled;
    }

    /// Attach a free-form value. Intended for [`MetadataAware`] hooks.
    pub fn insert_additional_value(&mut self, key: impl Into<String>, value: Value) {
        self.additional_values.insert(key.into(), value);
    }
}

/// Builder for [`ModelMetadata`].
pub struct ModelMetadataBuilder {
    metadata: ModelMetadata,
    hooks: Vec<Arc<dyn MetadataAware>>,
}

impl ModelMetadataBuilder {
    fn new(name: String, kind: ModelKind) -> Self {
        let is_nullable = !kind.is_value_type();
        Self {
            metadata: ModelMetadata {
                name,
                kind,
                is_nullable,
                display_name: None,
                properties: Vec::new(),
                annotations: Vec::new(),
                request_validation_enabled: true,
                convert_empty_string_to_null: true,
                error_info: None,
                additional_values: IndexMap::new(),
            },
            hooks: Vec::new(),
        }
    }

    /// Override nullability.
    #[must_use]
    pub const fn nullable(mut self, nullable: bool) -> Self {
        self.metadata.is_nullable = nullable;
        self
    }

    /// Set the display name used in messages.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.metadata.display_name = Some(display_name.into());
        self
    }

    /// Add a child property.
    #[must_use]
    pub fn property(mut self, property: impl Into<Arc<ModelMetadata>>) -> Self {
        self.metadata.properties.push(property.into());
        self
    }

    /// Add a data annotation.
    #[must_use]
    pub fn annotate(mut self, annotation: DataAnnotation) -> Self {
        self.metadata.annotations.push(annotation);
        self
    }

    /// Keep empty strings as empty strings instead of `null`.
    #[must_use]
    pub const fn convert_empty_string_to_null(mut self, convert: bool) -> Self {
        self.metadata.convert_empty_string_to_null = convert;
        self
    }

    /// Attach model-supplied error information.
    #[must_use]
    pub fn error_info(mut self, info: Arc<dyn DataErrorInfo>) -> Self {
        self.metadata.error_info = Some(info);
        self
    }

    /// Register a hook run when the metadata is built.
    #[must_use]
    pub fn aware(mut self, hook: impl MetadataAware + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Run the creation hooks and freeze the metadata.
    #[must_use]
    pub fn build(self) -> Arc<ModelMetadata> {
        let mut metadata = self.metadata;
        for hook in &self.hooks {
            hook.on_metadata_created(&mut metadata);
        }
        Arc::new(metadata)
    }
}

impl From<ModelMetadataBuilder> for Arc<ModelMetadata> {
    fn from(builder: ModelMetadataBuilder) -> Self {
        builder.build()
    }
}
