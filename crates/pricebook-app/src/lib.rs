// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod catalog;
pub mod forms;
pub mod ids;
pub mod model;
pub mod money;
pub mod parse;
pub mod receipt;
pub mod state;
pub mod style;

pub use catalog::*;
pub use forms::*;
pub use ids::*;
pub use model::*;
pub use money::*;
pub use parse::*;
pub use receipt::*;
pub use state::*;
pub use style::*;
