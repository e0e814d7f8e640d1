pub mod rejoin;
pub mod restrictions;
