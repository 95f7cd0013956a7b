//! Platform-agnostic types for SmartTank water-tank monitors.
//!
//! This crate holds everything about a SmartTank setup that does not touch
//! Bluetooth: the values a user enters in the setup wizard, their
//! validation, the text commands the firmware understands, and the keys
//! under which confirmed values are persisted.
//!
//! # Example
//!
//! ```
//! use smarttank_types::{Command, CostConfig, CostKind, LengthUnit, TankDimensions};
//!
//! let dims = TankDimensions::parse("150", LengthUnit::Cm, "60", LengthUnit::Cm)
//!     .unwrap()
//!     .normalize()
//!     .unwrap();
//! assert_eq!(
//!     Command::SetTankDimensions(dims).to_wire(),
//!     "SET_TANK_DIMENSIONS:120.0:60.0"
//! );
//!
//! let cost = CostConfig::new(CostKind::Electricity, "20").unwrap();
//! assert_eq!(Command::SetCost(cost).to_wire(), "SET_COST:electricity:20");
//! ```

pub mod command;
pub mod cost;
pub mod dimensions;
pub mod error;
pub mod store;
pub mod uuid;

pub use command::Command;
pub use cost::{CostConfig, CostKind};
pub use dimensions::{LengthUnit, NormalizedDimensions, TankDimensions, one_decimal};
pub use error::{ValidationError, ValidationResult};
pub use store::{KeyValueStore, MemoryStore, keys};
pub use uuid as uuids;
