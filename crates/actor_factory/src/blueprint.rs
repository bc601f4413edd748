//! 蓝图描述
//!
//! 名称加属性覆盖，生成时对照服务器目录解析。

use std::collections::{BTreeMap, HashMap};

use contracts::{ResolvedBlueprint, SimWorld, SimulatorError};
use rand::seq::IndexedRandom;

/// 存放 actor 名称的属性键
pub const ROLE_NAME: &str = "role_name";

/// 客户端蓝图描述
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    name: String,
    /// `None` 表示解析时随机取推荐值
    attributes: BTreeMap<String, Option<String>>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &BTreeMap<String, Option<String>> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_deref())
    }

    /// 设置覆盖；`None` 或空值表示随机取推荐值
    pub fn set_attribute(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        let value = value.map(Into::into).filter(|v: &String| !v.is_empty());
        self.attributes.insert(key.into(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        self.attributes.remove(key).is_some()
    }

    /// 对照世界目录解析
    pub fn resolve(&self, world: &dyn SimWorld) -> Result<ResolvedBlueprint, SimulatorError> {
        let info = world
            .find_blueprint(&self.name)?
            .ok_or_else(|| SimulatorError::blueprint_not_found(&self.name))?;

        let mut resolved = HashMap::with_capacity(self.attributes.len());
        for (key, value) in &self.attributes {
            let attribute =
                info.attribute(key)
                    .ok_or_else(|| SimulatorError::AttributeNotFound {
                        blueprint: self.name.clone(),
                        attribute: key.clone(),
                    })?;

            if !attribute.modifiable {
                return Err(SimulatorError::AttributeNotModifiable {
                    blueprint: self.name.clone(),
                    attribute: key.clone(),
                });
            }

            let value = match value {
                Some(v) => v.clone(),
                None => attribute
                    .recommended_values
                    .choose(&mut rand::rng())
                    .cloned()
                    .ok_or_else(|| SimulatorError::NoRecommendedValue {
                        blueprint: self.name.clone(),
                        attribute: key.clone(),
                    })?,
            };
            resolved.insert(key.clone(), value);
        }

        Ok(ResolvedBlueprint {
            id: info.id,
            attributes: resolved,
        })
    }
}
