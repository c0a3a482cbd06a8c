pub(crate) mod arena;
pub mod context;
pub mod scheduler;
pub mod task;
pub mod thread;
