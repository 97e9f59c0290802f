//! EOModeler Property Lists
//!
//! This crate reads and writes the OpenStep-style ASCII property list
//! format used for every file inside an `.eomodeld` folder. It knows
//! nothing about models or entities; it only converts between text and a
//! tree of [`Value`]s.
//!
//! # Format Overview
//!
//! ```text
//! {
//!     name = Person;
//!     className = "com.example.Person";
//!     attributes = (
//!         {
//!             name = id;
//!             width = 10;
//!         }
//!     );
//! }
//! ```
//!
//! # Example
//!
//! ```rust
//! use eomodeler_plist::{Value, from_str, to_string};
//!
//! let value = from_str("{ name = Person; width = 10; }").unwrap();
//! let dict = value.as_dictionary().unwrap();
//! assert_eq!(dict.get("width"), Some(&Value::Integer(10)));
//! assert_eq!(from_str(&to_string(&value)).unwrap(), value);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod parser;
pub mod value;
pub mod writer;

pub use error::{Error, Result};
pub use parser::{Parser, from_file, from_str};
pub use value::{Dictionary, Value};
pub use writer::{to_file, to_string};
