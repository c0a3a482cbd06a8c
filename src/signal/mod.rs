pub mod signal;
pub mod stack;
pub mod tween;
