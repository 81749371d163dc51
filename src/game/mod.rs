pub mod autoplay;
pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod life;
pub mod parsing;
pub mod timing_windows;
