mod serializer;
pub use serializer::{Flavor, Order, Serializer};
