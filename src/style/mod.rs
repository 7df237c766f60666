//! Style engine: stylesheet parsing, selector matching and cascade

pub mod cascade;
pub mod css;

pub use cascade::{ComputedStyle, StyleEngine, StyledNode, StyledTree};
pub use css::{Color, CssParser, Declaration, Rule, Selector, Stylesheet, Unit, Value};
