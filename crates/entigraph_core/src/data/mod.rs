//! Persisted object state.
//!
//! A [`DataContainer`] holds the [`PropertyValue`]s of one object, foreign
//! keys included. The [`DataContainerMap`] owns all containers of a
//! transaction.

mod container;
mod map;
mod property_value;
mod value;

pub use container::{DataContainer, DataContainerState};
pub use map::DataContainerMap;
pub use property_value::PropertyValue;
pub use value::Value;
