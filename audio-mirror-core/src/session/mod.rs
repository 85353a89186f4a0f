pub mod capture;
pub mod playback;
pub mod router;
