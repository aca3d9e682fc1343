pub mod canvas;
pub mod detection;
pub mod detection_line;
pub mod mjpeg;
pub mod status;
