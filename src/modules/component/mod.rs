// src/modules/component/mod.rs

pub mod database;
pub use database::ComponentDatabase;

use crate::error::{Result, SprinklerError};
use crate::util::database::Database;
use crate::{log_debug, log_error};

/// Logical devices a product is provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Valve,
    RemoteSwitch,
    Timer,
    FlowSensor,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Valve => "valve",
            ComponentKind::RemoteSwitch => "remote-switch",
            ComponentKind::Timer => "timer",
            ComponentKind::FlowSensor => "flow-sensor",
        }
    }

    pub fn all() -> [ComponentKind; 4] {
        [
            ComponentKind::Valve,
            ComponentKind::RemoteSwitch,
            ComponentKind::Timer,
            ComponentKind::FlowSensor,
        ]
    }
}

/// Look up a component id. Failing here is fatal for whoever is being constructed.
pub fn resolve_component(db: &Database, product_id: i64, kind: ComponentKind) -> Result<i64> {
    let found = db.with_transaction(|tx| Ok(tx.component_id(product_id, kind)?))?;

    match found {
        Some(id) => {
            log_debug!(component = kind.as_str(), component_id = id, "Resolved component");
            Ok(id)
        }
        None => {
            log_error!(component = kind.as_str(), product_id, "Component ID not found in DB");
            Err(SprinklerError::ComponentNotFound {
                product_id,
                component: kind.as_str().to_string(),
            })
        }
    }
}
