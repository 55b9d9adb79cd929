//! Per-component index of declared parameters.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::types::ParameterDef;
use super::value::ParamValue;
use super::{Parameter, ParameterBase};
use crate::descriptor::is_valid_name;
use crate::{Error, Result};

/// Parameters of one component, kept in declaration order.
#[derive(Default)]
pub struct ParameterRegistry {
    params: RwLock<Vec<Arc<dyn ParameterBase>>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter and return its typed handle.
    ///
    /// The name must be reachable by a descriptor segment. `owner` is only
    /// used for error messages.
    pub fn declare<T: ParamValue>(
        &self,
        owner: &str,
        def: ParameterDef<T>,
    ) -> Result<Arc<Parameter<T>>> {
        if !is_valid_name(&def.name) {
            return Err(Error::invalid_descriptor(
                format!("{owner}:{}", def.name),
                "invalid parameter name",
            ));
        }
        let param = Arc::new(Parameter::new(def)?);

        let mut params = self.params.write();
        if params.iter().any(|p| p.name() == param.name()) {
            return Err(Error::NameClash {
                parent: owner.to_string(),
                name: param.name().to_string(),
            });
        }
        trace!(owner, param = %param.name(), "Declared parameter");
        params.push(param.clone());
        Ok(param)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ParameterBase>> {
        self.params.read().iter().find(|p| p.name() == name).cloned()
    }

    /// Typed lookup by local name.
    pub fn get_typed<T: ParamValue>(&self, name: &str) -> Result<Arc<Parameter<T>>> {
        let param = self
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("Parameter [{name}]")))?;
        param.into_any().downcast::<Parameter<T>>().map_err(|_| Error::TypeMismatch {
            descriptor: name.to_string(),
            requested: std::any::type_name::<T>(),
        })
    }

    /// Snapshot of all parameters, in declaration order.
    pub fn all(&self) -> Vec<Arc<dyn ParameterBase>> {
        self.params.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.params.read().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.params.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_and_lookup() {
        let reg = ParameterRegistry::new();
        let fps = reg
            .declare("cam", ParameterDef::new("fps", "", 30u32, ""))
            .unwrap();
        reg.declare("cam", ParameterDef::new("name", "", String::from("front"), ""))
            .unwrap();

        assert_eq!(reg.names(), vec!["fps", "name"]);
        assert_eq!(reg.len(), 2);
        fps.set(10).unwrap();
        assert_eq!(reg.get("fps").unwrap().strget(), "10");
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn test_declare_duplicate_fails() {
        let reg = ParameterRegistry::new();
        reg.declare("cam", ParameterDef::new("fps", "", 30u32, ""))
            .unwrap();
        let err = reg
            .declare("cam", ParameterDef::new("fps", "", 1.5f64, ""))
            .unwrap_err();
        assert!(matches!(err, Error::NameClash { .. }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_declare_rejects_unreachable_names() {
        let reg = ParameterRegistry::new();
        for bad in ["frame-rate", "my fps", "", "2fps", "fps*"] {
            assert!(
                matches!(
                    reg.declare("cam", ParameterDef::new(bad, "", 30u32, "")),
                    Err(Error::InvalidDescriptor { .. })
                ),
                "{bad}"
            );
        }
        assert!(reg.is_empty());
        reg.declare("cam", ParameterDef::new("frame_rate", "", 30u32, ""))
            .unwrap();
    }

    #[test]
    fn test_get_typed() {
        let reg = ParameterRegistry::new();
        reg.declare("cam", ParameterDef::new("fps", "", 30u32, ""))
            .unwrap();
        assert_eq!(reg.get_typed::<u32>("fps").unwrap().get(), 30);
        assert!(matches!(
            reg.get_typed::<i64>("fps"),
            Err(Error::TypeMismatch { .. })
        ));
        assert!(matches!(
            reg.get_typed::<u32>("nope"),
            Err(Error::NotFound(_))
        ));
    }
}
