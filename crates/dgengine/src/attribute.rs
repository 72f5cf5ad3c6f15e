// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attributes: value type, behavior flags and defaults of a plug.

use crate::error::{AccessError, GraphError, Result};
use crate::value::{Value, ValueType};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

/// Compatibility rating, 0 meaning "cannot hold" and 255 a perfect match
pub type Rate = u8;

/// No compatibility
pub const RATE_NO: Rate = 0;
/// Usable, but not a perfect fit
pub const RATE_GOOD: Rate = 127;
/// Perfect fit
pub const RATE_PERFECT: Rate = 255;

/// Behavior flags of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttributeFlags(u8);

impl AttributeFlags {
    /// No flags
    pub const NONE: Self = Self(0);
    /// Values of derived types are rejected, only the declared type matches
    pub const EXACT_TYPE: Self = Self(1);
    /// The plug cannot be written through `set`
    pub const READONLY: Self = Self(1 << 1);
    /// The plug is computed even if nothing affects it
    pub const COMPUTABLE: Self = Self(1 << 2);
    /// The plug holds classes rather than instances
    pub const CLS: Self = Self(1 << 3);
    /// Values are recomputed on every read instead of being cached
    pub const UNCACHED: Self = Self(1 << 4);
    /// The plug cannot be the destination of a connection
    pub const UNCONNECTABLE: Self = Self(1 << 5);
    /// Values coming through connections and dynamic defaults are type checked
    pub const CHECK_PASSING_VALUES: Self = Self(1 << 6);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether all flags in `other` are set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AttributeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AttributeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[derive(Clone)]
enum DefaultValue {
    Static(Value),
    Dynamic(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

/// Type and flags of a plug, plus its optional default value
#[derive(Debug, Clone)]
pub struct Attribute {
    value_type: &'static ValueType,
    flags: AttributeFlags,
    default: Option<DefaultValue>,
}

impl Attribute {
    /// Create an attribute without default value
    pub fn new(value_type: &'static ValueType, flags: AttributeFlags) -> Self {
        Self {
            value_type,
            flags,
            default: None,
        }
    }

    /// Set a static default, which must be compatible with the attribute
    pub fn with_default(mut self, value: impl Into<Value>) -> Result<Self> {
        let value = value.into();
        if self.compatibility_rate(&value) == RATE_NO {
            return Err(GraphError::Type(format!(
                "default value {value:?} is not compatible with an attribute of type {}",
                self.value_type
            )));
        }
        self.default = Some(DefaultValue::Static(value));
        Ok(self)
    }

    /// Produce the default on demand by calling `provider`
    pub fn with_dynamic_default(mut self, provider: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Dynamic(Arc::new(provider)));
        self
    }

    /// Declared value type
    pub fn value_type(&self) -> &'static ValueType {
        self.value_type
    }

    /// Behavior flags
    pub fn flags(&self) -> AttributeFlags {
        self.flags
    }

    /// Whether all given flags are set
    pub fn has_flag(&self, flag: AttributeFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Whether a default value (static or dynamic) is configured
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Rate `cls` by its position in our inheritance chain.
    ///
    /// Our own type scores perfect, its bases linearly less down to the root.
    /// Subtypes of our type score perfect too, unless `exact_type` is set.
    fn class_rating(&self, cls: &'static ValueType, exact_type: bool) -> Rate {
        let mut chain = self.value_type.mro();
        chain.reverse();

        let Some(index) = chain.iter().position(|ty| *ty == cls) else {
            if !exact_type && cls.is_subtype_of(self.value_type) {
                return RATE_PERFECT;
            }
            return RATE_NO;
        };

        if chain.len() == 1 {
            return RATE_PERFECT;
        }

        let rate = (index as f32 / (chain.len() - 1) as f32 * f32::from(RATE_PERFECT)) as Rate;
        if exact_type && rate != RATE_PERFECT {
            return RATE_NO;
        }
        rate
    }

    /// How well this attribute can hold `value`
    pub fn compatibility_rate(&self, value: &Value) -> Rate {
        let exact = self.has_flag(AttributeFlags::EXACT_TYPE);
        let wants_class = self.has_flag(AttributeFlags::CLS);
        match value {
            Value::Type(cls) if wants_class => self.class_rating(*cls, exact),
            Value::Type(_) => RATE_NO,
            _ if wants_class => RATE_NO,
            other => self.class_rating(other.value_type(), exact),
        }
    }

    /// How well this attribute can store values produced as `other`'s default.
    ///
    /// Directed: `a.affinity(b)` need not equal `b.affinity(a)`. Falls back to
    /// comparing classes when `other` has no usable default.
    pub fn affinity(&self, other: &Attribute) -> Rate {
        if self.has_flag(AttributeFlags::CLS) != other.has_flag(AttributeFlags::CLS) {
            return RATE_NO;
        }

        match other.default_value() {
            Ok(value) => self.compatibility_rate(&value),
            Err(_) => self.class_rating(other.value_type, self.has_flag(AttributeFlags::EXACT_TYPE)),
        }
    }

    /// Quality of a connection from this attribute to `destination`
    pub fn connection_affinity(&self, destination: &Attribute) -> Rate {
        if destination.has_flag(AttributeFlags::UNCONNECTABLE) {
            return RATE_NO;
        }
        destination.affinity(self)
    }

    /// The default value, invoking the provider for dynamic defaults
    pub fn default_value(&self) -> Result<Value> {
        match &self.default {
            None => Err(AccessError::MissingDefaultValue(format!(
                "attribute of type {} has no default value",
                self.value_type
            ))
            .into()),
            Some(DefaultValue::Static(value)) => Ok(value.clone()),
            Some(DefaultValue::Dynamic(provider)) => {
                let value = provider();
                if self.has_flag(AttributeFlags::CHECK_PASSING_VALUES)
                    && self.compatibility_rate(&value) == RATE_NO
                {
                    return Err(GraphError::Type(format!(
                        "dynamic default {value:?} does not fit type {}",
                        self.value_type
                    )));
                }
                Ok(value)
            }
        }
    }
}
