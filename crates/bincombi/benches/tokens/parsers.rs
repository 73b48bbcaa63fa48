pub mod bincombi;
pub mod handrolled;
