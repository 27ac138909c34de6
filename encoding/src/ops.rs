//! Module for attribute operation descriptors.
//!
//! Pixel data writers describe the metadata changes
//! which come with a new encoding
//! (bit depth, photometric interpretation, lossy compression flags)
//! as a list of [`AttributeOp`]s,
//! which the attribute store applies after the pixel data is re-encoded.
use std::borrow::Cow;
use std::fmt;

use crate::{PrimitiveValue, Tag};

/// Descriptor for a single operation
/// to apply over a DICOM data set.
///
/// This type is purely descriptive.
/// Attribute operations can only select attributes at the root of the data set.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeOp {
    /// the tag of the attribute to apply
    pub tag: Tag,
    /// the effective action to apply
    pub action: AttributeAction,
}

impl AttributeOp {
    /// Construct an attribute operation.
    pub fn new(tag: impl Into<Tag>, action: AttributeAction) -> Self {
        AttributeOp {
            tag: tag.into(),
            action,
        }
    }
}

impl fmt::Display for AttributeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.tag)
    }
}

/// Descriptor for the kind of action to apply over an attribute.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AttributeAction {
    /// Remove the attribute if it exists.
    ///
    /// Do nothing otherwise.
    Remove,
    /// Fully reset the attribute with the given DICOM value,
    /// creating it if it does not exist yet.
    Set(PrimitiveValue),
    /// Fully reset a textual attribute with the given string,
    /// creating it if it does not exist yet.
    SetStr(Cow<'static, str>),
    /// Provide the attribute with the given DICOM value,
    /// if it does not exist yet.
    SetIfMissing(PrimitiveValue),
    /// Provide the textual attribute with the given string,
    /// if it does not exist yet.
    SetStrIfMissing(Cow<'static, str>),
    /// Fully replace the value with the given DICOM value,
    /// but only if the attribute already exists.
    Replace(PrimitiveValue),
    /// Append a string as an additional textual value,
    /// creating the attribute if it does not exist yet.
    PushStr(Cow<'static, str>),
}

impl AttributeAction {
    /// Report whether this is considered a _constructive_ action,
    /// operations of which create new elements if they do not exist yet.
    pub fn is_constructive(&self) -> bool {
        matches!(
            self,
            AttributeAction::Set(_)
                | AttributeAction::SetStr(_)
                | AttributeAction::SetIfMissing(_)
                | AttributeAction::SetStrIfMissing(_)
                | AttributeAction::PushStr(_)
        )
    }
}

impl fmt::Display for AttributeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeAction::Remove => f.write_str("remove"),
            AttributeAction::Set(v) | AttributeAction::Replace(v) => {
                write!(f, "set `{}` on", v.to_str())
            }
            AttributeAction::SetIfMissing(v) => write!(f, "provide `{}` to", v.to_str()),
            AttributeAction::SetStr(s) => write!(f, "set `{}` on", s),
            AttributeAction::SetStrIfMissing(s) => write!(f, "provide `{}` to", s),
            AttributeAction::PushStr(s) => write!(f, "push `{}` to", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn constructive_actions() {
        assert!(AttributeAction::SetStr("RGB".into()).is_constructive());
        assert!(AttributeAction::PushStr("ISO_10918_1".into()).is_constructive());
        assert!(!AttributeAction::Remove.is_constructive());
        assert!(!AttributeAction::Replace(PrimitiveValue::from(8_u16)).is_constructive());
    }

    #[test]
    fn display_op() {
        let op = AttributeOp::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            AttributeAction::SetStr("RGB".into()),
        );
        assert_eq!(op.to_string(), "set `RGB` on (0028,0004)");
    }
}
