//! Answer-verification engines: pure computation, no I/O, no wire types
//! beyond what `domain` already defines. Each engine is total from the
//! caller's perspective; anything malformed resolves to "incorrect".

pub mod expression;
pub mod geometry;
pub mod maze;
