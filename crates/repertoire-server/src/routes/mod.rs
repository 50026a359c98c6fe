pub mod annotations;
pub mod chapters;
pub mod health;
pub mod lines;
pub mod studies;
pub mod training;
