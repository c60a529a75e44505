//! Captured method signatures and the parameter types they are made of.

use serde::{Serialize, Serializer};
use std::fmt;

use crate::error::{DispatchError, Result};
use crate::value::{TypeDesc, Value};

/// Declared type of a parameter or result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Str,
    List(Box<ParamType>),
    Map(Box<ParamType>),
    /// Accepts values of any runtime type without a match check
    Any,
    Object(TypeDesc),
}

impl ParamType {
    pub fn list(elem: ParamType) -> Self {
        Self::List(Box::new(elem))
    }

    pub fn map(elem: ParamType) -> Self {
        Self::Map(Box::new(elem))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Exact type check: tags must match, lists and maps check every element.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Any, _) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Str, Value::Str(_)) => true,
            (Self::List(elem), Value::List(items)) => items.iter().all(|item| elem.accepts(item)),
            (Self::Map(elem), Value::Map(entries)) => entries.values().all(|item| elem.accepts(item)),
            (Self::Object(desc), Value::Object(object)) => object.type_desc() == *desc,
            _ => false,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Float => f.write_str("float"),
            Self::Str => f.write_str("string"),
            Self::List(elem) => write!(f, "list<{}>", elem),
            Self::Map(elem) => write!(f, "map<{}>", elem),
            Self::Any => f.write_str("any"),
            Self::Object(desc) => write!(f, "{}", desc),
        }
    }
}

impl Serialize for ParamType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One declared argument as seen by signature capture
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: ParamType,
    pub variadic: bool,
}

/// Parameter list and variadic flag of one registered method.
///
/// `params()[0]` is always the receiver. A variadic signature's last
/// parameter is `ParamType::List(elem)` where `elem` is the element type
/// of the trailing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSignature {
    name: String,
    params: Vec<ParamType>,
    variadic: bool,
    returns: Vec<ParamType>,
}

impl MethodSignature {
    pub(crate) fn new(
        name: impl Into<String>,
        receiver: TypeDesc,
        args: Vec<Param>,
        returns: Vec<ParamType>,
    ) -> Result<Self> {
        let name = name.into();

        if let Some(position) = args
            .iter()
            .take(args.len().saturating_sub(1))
            .position(|arg| arg.variadic)
        {
            return Err(DispatchError::InvalidSignature {
                method: name,
                reason: format!("variadic parameter at position {} is not the last one", position + 1),
            });
        }

        let variadic = args.last().map_or(false, |arg| arg.variadic);
        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(ParamType::Object(receiver));
        params.extend(args.into_iter().map(|arg| arg.ty));

        Ok(Self {
            name,
            params,
            variadic,
            returns,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every parameter type, receiver first
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Total parameter count including the receiver
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Declared parameters without the receiver
    pub fn args(&self) -> &[ParamType] {
        &self.params[1..]
    }

    /// Leading parameters that are checked positionally
    pub fn fixed_args(&self) -> &[ParamType] {
        let args = self.args();
        if self.variadic {
            &args[..args.len() - 1]
        } else {
            args
        }
    }

    /// Element type of the trailing values, if the method is variadic
    pub fn variadic_elem(&self) -> Option<&ParamType> {
        if !self.variadic {
            return None;
        }
        match self.params.last() {
            Some(ParamType::List(elem)) => Some(elem),
            _ => None,
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn receiver(&self) -> &ParamType {
        &self.params[0]
    }

    pub fn returns(&self) -> &[ParamType] {
        &self.returns
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        let args = self.args();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match (self.variadic && i == args.len() - 1, arg) {
                (true, ParamType::List(elem)) => write!(f, "...{}", elem)?,
                _ => write!(f, "{}", arg)?,
            }
        }
        f.write_str(")")?;
        match self.returns.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {}", single),
            many => {
                f.write_str(" -> (")?;
                for (i, ty) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                f.write_str(")")
            }
        }
    }
}
