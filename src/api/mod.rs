pub mod keyframes;
pub mod models;
