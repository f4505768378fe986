//! Alarm expressions compiled against a device schema and evaluated over
//! JSON state snapshots.
//!
//! ```
//! use alarm_expr::{Expression, Inventory};
//!
//! let inventory = Inventory::from_json(r#"{
//!   "methods": {
//!     "port.speed.get": {
//!       "params": [],
//!       "notification": true,
//!       "result": { "class": "leaf", "name": "uint32" }
//!     }
//!   }
//! }"#).unwrap();
//!
//! let expr = Expression::new("port.speed > 100", &inventory);
//! assert!(expr.ok());
//!
//! let mut bindings = std::collections::HashMap::new();
//! bindings.insert(
//!     "port.speed".to_string(),
//!     r#"{"id":1,"error":null,"result":1000}"#.to_string(),
//! );
//! assert!(expr.evaluate(&bindings));
//! ```

pub mod error;
pub mod expr;
pub mod inventory;

pub use error::ExprError;
pub use expr::Expression;
pub use inventory::Inventory;
