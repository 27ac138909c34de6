//! This module contains the implementation for an in-memory DICOM object.
//!
//! Elements are kept sorted by tag.
//! The pixel data element itself is never stored here:
//! see [`PixelData`](crate::PixelData) for how it is located.
use crate::dictionary;
use crate::{AccessError, ApplyError, NoSuchDataElementTagSnafu};
use fragstream_encoding::descriptor::AttributeSource;
use fragstream_encoding::ops::{AttributeAction, AttributeOp};
use fragstream_encoding::{PrimitiveValue, Tag, VR};
use snafu::OptionExt;
use std::collections::BTreeMap;

/// The value of an in-memory data element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A primitive value
    Primitive(PrimitiveValue),
    /// A sequence of nested data set items
    Sequence(Vec<InMemDicomObject>),
}

/// A data element held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemElement {
    tag: Tag,
    vr: VR,
    value: Value,
}

impl InMemElement {
    pub fn new(tag: impl Into<Tag>, vr: VR, value: Value) -> Self {
        InMemElement {
            tag: tag.into(),
            vr,
            value,
        }
    }

    /// Create a primitive data element.
    pub fn primitive(tag: impl Into<Tag>, vr: VR, value: impl Into<PrimitiveValue>) -> Self {
        Self::new(tag, vr, Value::Primitive(value.into()))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn vr(&self) -> VR {
        self.vr
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Retrieve the primitive value, if this is not a sequence.
    pub fn primitive_value(&self) -> Option<&PrimitiveValue> {
        match &self.value {
            Value::Primitive(v) => Some(v),
            Value::Sequence(_) => None,
        }
    }

    /// Retrieve the sequence items, if this is a sequence.
    pub fn items(&self) -> Option<&[InMemDicomObject]> {
        match &self.value {
            Value::Primitive(_) => None,
            Value::Sequence(items) => Some(items),
        }
    }

    /// Retrieve the value as a single string, trimmed of padding.
    pub fn to_str(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.primitive_value().map(PrimitiveValue::to_str)
    }
}

/// A DICOM data set held in memory.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InMemDicomObject {
    entries: BTreeMap<Tag, InMemElement>,
}

impl InMemDicomObject {
    /// Create a new empty object.
    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Construct a DICOM object from an iterator of elements.
    pub fn from_element_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = InMemElement>,
    {
        InMemDicomObject {
            entries: iter.into_iter().map(|e| (e.tag, e)).collect(),
        }
    }

    /// Insert a data element into the object,
    /// replacing and returning any previous element of the same tag.
    pub fn put(&mut self, elt: InMemElement) -> Option<InMemElement> {
        self.entries.insert(elt.tag, elt)
    }

    /// Insert a primitive data element,
    /// using the standard value representation of the attribute
    /// or one inferred from the value.
    pub fn put_value(&mut self, tag: impl Into<Tag>, value: impl Into<PrimitiveValue>) {
        let tag = tag.into();
        let value = value.into();
        let vr = self
            .entries
            .get(&tag)
            .map(|e| e.vr)
            .or_else(|| dictionary::lookup_vr(tag))
            .unwrap_or_else(|| infer_vr(&value));
        self.put(InMemElement::new(tag, vr, Value::Primitive(value)));
    }

    /// Remove the element with the given tag,
    /// returning whether it existed.
    pub fn remove_element(&mut self, tag: Tag) -> bool {
        self.entries.remove(&tag).is_some()
    }

    /// Remove the element with the given tag and return it.
    pub fn take_element(&mut self, tag: Tag) -> Option<InMemElement> {
        self.entries.remove(&tag)
    }

    /// Retrieve a particular DICOM element by its tag.
    pub fn element(&self, tag: Tag) -> Result<&InMemElement, AccessError> {
        self.entries
            .get(&tag)
            .context(NoSuchDataElementTagSnafu { tag })
    }

    /// Retrieve a particular DICOM element by its tag,
    /// or `None` if it does not exist.
    pub fn element_opt(&self, tag: Tag) -> Option<&InMemElement> {
        self.entries.get(&tag)
    }

    /// Retrieve the value of an element as a string, trimmed of padding.
    pub fn str_value(&self, tag: Tag) -> Result<String, AccessError> {
        let elem = self.element(tag)?;
        Ok(elem
            .to_str()
            .map(|s| s.into_owned())
            .unwrap_or_default())
    }

    /// Retrieve the first value of an element as an unsigned 16-bit integer,
    /// or `None` if the element is missing or not numeric.
    pub fn u16_value(&self, tag: Tag) -> Option<u16> {
        self.element_opt(tag)?.primitive_value()?.to_u16()
    }

    /// Retrieve the first value of an element as an integer,
    /// accepting binary integers and integer strings.
    pub fn int_value(&self, tag: Tag) -> Option<i64> {
        self.element_opt(tag)?.primitive_value()?.to_int()
    }

    /// Retrieve the first value of an element as a floating point number,
    /// accepting binary numbers and decimal strings.
    pub fn f64_value(&self, tag: Tag) -> Option<f64> {
        self.element_opt(tag)?.primitive_value()?.to_f64()
    }

    /// Iterate over the elements in ascending tag order.
    pub fn iter(&self) -> impl Iterator<Item = &InMemElement> {
        self.entries.values()
    }

    /// The number of elements in the object.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply the given attribute operation on this object.
    ///
    /// Values given as text are stored as single string values.
    pub fn apply(&mut self, op: AttributeOp) -> Result<(), ApplyError> {
        let AttributeOp { tag, action } = op;
        match action {
            AttributeAction::Remove => {
                self.remove_element(tag);
            }
            AttributeAction::Set(value) => self.put_value(tag, value),
            AttributeAction::SetStr(s) => self.put_value(tag, PrimitiveValue::from(&*s)),
            AttributeAction::SetIfMissing(value) => {
                if !self.entries.contains_key(&tag) {
                    self.put_value(tag, value);
                }
            }
            AttributeAction::SetStrIfMissing(s) => {
                if !self.entries.contains_key(&tag) {
                    self.put_value(tag, PrimitiveValue::from(&*s));
                }
            }
            AttributeAction::Replace(value) => {
                if self.entries.contains_key(&tag) {
                    self.put_value(tag, value);
                }
            }
            AttributeAction::PushStr(s) => match self.entries.get_mut(&tag) {
                None => self.put_value(tag, PrimitiveValue::from(&*s)),
                Some(elem) => match &mut elem.value {
                    Value::Primitive(PrimitiveValue::Strs(values)) => {
                        values.push(s.into_owned());
                    }
                    Value::Primitive(PrimitiveValue::Empty) => {
                        elem.value = Value::Primitive(PrimitiveValue::from(&*s));
                    }
                    _ => return crate::IncompatibleTypesSnafu { tag }.fail(),
                },
            },
            _ => return crate::UnsupportedActionSnafu.fail(),
        }
        Ok(())
    }
}

impl AttributeSource for InMemDicomObject {
    fn attribute(&self, tag: Tag) -> Option<&PrimitiveValue> {
        self.entries.get(&tag)?.primitive_value()
    }
}

/// Choose a value representation for a value with no known attribute.
fn infer_vr(value: &PrimitiveValue) -> VR {
    match value {
        PrimitiveValue::Empty | PrimitiveValue::U8(_) => VR::OB,
        PrimitiveValue::Strs(_) => VR::LO,
        PrimitiveValue::U16(_) => VR::US,
        PrimitiveValue::I16(_) => VR::SS,
        PrimitiveValue::U32(_) => VR::UL,
        PrimitiveValue::I32(_) => VR::SL,
        PrimitiveValue::U64(_) => VR::UV,
        PrimitiveValue::I64(_) => VR::SV,
        PrimitiveValue::F32(_) => VR::FL,
        PrimitiveValue::F64(_) => VR::FD,
    }
}
