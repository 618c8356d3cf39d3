pub mod database;
pub mod io;
pub mod log;
pub mod task;
