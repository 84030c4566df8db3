pub mod keyframes;
