pub mod player;
pub mod render;
pub mod scene;
pub mod settings;
pub mod split;
